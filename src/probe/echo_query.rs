use async_trait::async_trait;
use hyper::body::Bytes;
use url::Url;

use super::ProbeStrategy;
use crate::{
    proxy::ProxyCandidate,
    utils::http::{build_get_request, hyper_client, read_success_body, HttpsClient},
};

/// Asks a proxy-aware echo service to make the round trip itself:
/// `<echo>/api/v1?proxy=host:port`.
#[derive(Debug, Clone)]
pub struct EchoQuery {
    client: HttpsClient,
}

impl EchoQuery {
    pub fn new() -> anyhow::Result<Self> {
        Ok(EchoQuery {
            client: hyper_client()?,
        })
    }

    pub fn query_url(candidate: &ProxyCandidate, target: &Url) -> anyhow::Result<Url> {
        let mut url = target.join("api/v1")?;
        url.query_pairs_mut()
            .clear()
            .append_pair("proxy", &candidate.authority());
        Ok(url)
    }
}

#[async_trait]
impl ProbeStrategy for EchoQuery {
    fn name(&self) -> &'static str {
        "echo-query"
    }

    async fn fetch(&self, candidate: &ProxyCandidate, target: &Url) -> anyhow::Result<Bytes> {
        let url = Self::query_url(candidate, target)?;
        let request = build_get_request(url.as_str(), None)?;
        read_success_body(&self.client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_goes_into_the_query() {
        let candidate = ProxyCandidate::new("1.2.3.4", "443").unwrap();
        let url = EchoQuery::query_url(
            &candidate,
            &Url::parse("https://echo.example/?old=1").unwrap(),
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://echo.example/api/v1?proxy=1.2.3.4%3A443");
    }
}
