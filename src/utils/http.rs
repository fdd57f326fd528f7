use anyhow::Context;
use hyper::{
    body::Bytes,
    client::HttpConnector,
    header::{ACCEPT, HOST, USER_AGENT},
    Body, Client, Request,
};
use hyper_tls::HttpsConnector;
use ua_generator::ua::spoof_ua;

use crate::error_context;

pub type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Client able to dial both `http` and `https`. Certificates and hostnames are not
/// verified because candidates are usually addressed by bare IP.
pub fn hyper_client() -> anyhow::Result<HttpsClient> {
    let tls = hyper_tls::native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .context(error_context!())?;
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    let connector = HttpsConnector::from((http, tls.into()));
    Ok(Client::builder().build::<_, Body>(connector))
}

/// Builds a `GET` with a spoofed browser user agent. `host` overrides the `Host` header.
pub fn build_get_request(uri: &str, host: Option<&str>) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder()
        .uri(uri)
        .header(USER_AGENT, spoof_ua())
        .header(ACCEPT, "application/json, text/plain, */*");
    if let Some(host) = host {
        builder = builder.header(HOST, host);
    }
    builder
        .body(Body::empty())
        .with_context(|| format!("invalid request uri {}", uri))
}

/// Sends `request` and returns the body of a 2xx response.
pub async fn read_success_body(client: &HttpsClient, request: Request<Body>) -> anyhow::Result<Bytes> {
    let response = client.request(request).await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("unexpected status {}", status);
    }
    let body = hyper::body::to_bytes(response.into_body())
        .await
        .context("failed to read response body")?;
    Ok(body)
}

/// `host:port`, bracketing bare IPv6 hosts.
pub fn authority(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
