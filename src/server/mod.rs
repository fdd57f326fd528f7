use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::Context;
use hyper::{
    header::CONTENT_TYPE,
    server::conn::AddrStream,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, StatusCode,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use self::response::{error_response, json_response, message_response, preflight_response};
use crate::{
    batch::BatchOrchestrator,
    checker::Checker,
    config::MAX_BATCH_BODY,
    error::CheckError,
    error_context,
    proxy::ProxyCandidate,
    utils::serializer::{ApiBatch, ApiResult},
};

pub mod request;
pub mod response;

/// Shared by every connection; holds nothing mutable.
#[derive(Debug, Clone)]
pub struct AppState {
    pub checker: Arc<Checker>,
    pub batch: BatchOrchestrator,
}

impl AppState {
    pub fn new(checker: Arc<Checker>, max_candidates: usize, concurrency: usize) -> Self {
        AppState {
            batch: BatchOrchestrator::new(checker.clone(), max_candidates, concurrency),
            checker,
        }
    }
}

#[derive(Debug)]
pub struct Server {
    pub addr: SocketAddr,
    state: Arc<AppState>,
}

impl Server {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Server {
            addr,
            state: Arc::new(state),
        }
    }

    /// Serves until `shutdown` fires. In-flight batches see the same token and stop
    /// between candidates.
    pub async fn start(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = self.state.clone();
        let cancel = shutdown.clone();
        let make_service = make_service_fn(move |conn: &AddrStream| {
            let state = state.clone();
            let cancel = cancel.clone();
            let remote = conn.remote_addr();
            async move {
                Ok::<_, Infallible>(service_fn(move |request| {
                    log::debug!("{} {} from {}", request.method(), request.uri(), remote);
                    handle_request(state.clone(), request, cancel.clone())
                }))
            }
        });

        let server = hyper::Server::try_bind(&self.addr)
            .with_context(|| format!("unable to bind {}", self.addr))?
            .http1_title_case_headers(true)
            .serve(make_service);
        log::info!("Listening on http://{}", server.local_addr());

        server
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context(error_context!())?;
        log::info!("Server stopped");
        Ok(())
    }
}

pub async fn handle_request(
    state: Arc<AppState>,
    request: Request<Body>,
    cancel: CancellationToken,
) -> Result<Response<Body>, Infallible> {
    if request.method() == Method::OPTIONS {
        return Ok(preflight_response());
    }

    let response = match (request.uri().path(), request.method()) {
        ("/api/check", &Method::GET) => {
            let query = request.uri().query().map(String::from);
            handle_check(&state, query.as_deref()).await
        }
        ("/api/batch", &Method::POST) => handle_batch(&state, request, &cancel).await,
        ("/api/check", _) | ("/api/batch", _) => {
            message_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        (path, _) => json_response(
            StatusCode::NOT_FOUND,
            &json!({
                "error": format!("no route for {}", path),
                "usage": [
                    "GET /api/check?ip=1.2.3.4&port=8080",
                    "POST /api/batch {\"proxies\": [\"1.2.3.4:8080\"]}"
                ]
            }),
        ),
    };
    Ok(response)
}

async fn handle_check(state: &AppState, query: Option<&str>) -> Response<Body> {
    let candidate = match request::check_params(query)
        .and_then(|(ip, port)| ProxyCandidate::new(&ip, &port))
    {
        Ok(candidate) => candidate,
        Err(err) => return error_response(&err),
    };

    match state.checker.check(candidate.to_string(), candidate).await {
        Ok(result) => json_response(StatusCode::OK, &ApiResult::from(&result)),
        Err(err) => {
            log::error!("single check failed: {}", err);
            error_response(&err)
        }
    }
}

async fn handle_batch(
    state: &AppState,
    request: Request<Body>,
    cancel: &CancellationToken,
) -> Response<Body> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let body = match request::read_body(request.into_body(), MAX_BATCH_BODY).await {
        Ok(body) => body,
        Err(err) => {
            log::warn!("rejected batch body: {}", err);
            return error_response(&err);
        }
    };

    let entries = match request::batch_entries(content_type.as_deref(), &body) {
        Ok(entries) => entries,
        Err(err) => return error_response(&err),
    };

    let batch = state.batch.run_entries(&entries, cancel).await;
    if batch.total_requested == 0 {
        return error_response(&CheckError::MissingParameter("proxies"));
    }
    json_response(StatusCode::OK, &ApiBatch::from(&batch))
}
