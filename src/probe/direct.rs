use anyhow::Context;
use async_trait::async_trait;
use hyper::body::Bytes;
use url::Url;

use super::ProbeStrategy;
use crate::{
    proxy::ProxyCandidate,
    utils::http::{build_get_request, hyper_client, read_success_body, HttpsClient},
};

/// Dials the candidate itself and asks for the echo service's path, with the echo
/// service's host in the `Host` header. Works against relays that forward by host.
#[derive(Debug, Clone)]
pub struct DirectDial {
    scheme: &'static str,
    client: HttpsClient,
}

impl DirectDial {
    pub fn http() -> anyhow::Result<Self> {
        Ok(DirectDial {
            scheme: "http",
            client: hyper_client()?,
        })
    }

    pub fn https() -> anyhow::Result<Self> {
        Ok(DirectDial {
            scheme: "https",
            client: hyper_client()?,
        })
    }

    pub fn target_uri(&self, candidate: &ProxyCandidate, target: &Url) -> String {
        let mut uri = format!("{}://{}{}", self.scheme, candidate.authority(), target.path());
        if let Some(query) = target.query() {
            uri.push('?');
            uri.push_str(query);
        }
        uri
    }
}

#[async_trait]
impl ProbeStrategy for DirectDial {
    fn name(&self) -> &'static str {
        match self.scheme {
            "https" => "https-direct",
            _ => "http-direct",
        }
    }

    async fn fetch(&self, candidate: &ProxyCandidate, target: &Url) -> anyhow::Result<Bytes> {
        let host = target.host_str().context("echo url has no host")?;
        let host = match target.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let request = build_get_request(&self.target_uri(candidate, target), Some(&host))?;
        read_success_body(&self.client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_query_follow_the_candidate() {
        let target = Url::parse("https://echo.example/json?full=1").unwrap();
        let candidate = ProxyCandidate::new("1.2.3.4", "8443").unwrap();
        let dial = DirectDial::https().unwrap();
        assert_eq!(
            dial.target_uri(&candidate, &target),
            "https://1.2.3.4:8443/json?full=1"
        );
        assert_eq!(dial.name(), "https-direct");

        let candidate = ProxyCandidate::new("2001:db8::5", "80").unwrap();
        let dial = DirectDial::http().unwrap();
        assert_eq!(
            dial.target_uri(&candidate, &Url::parse("http://echo.example").unwrap()),
            "http://[2001:db8::5]:80/"
        );
        assert_eq!(dial.name(), "http-direct");
    }
}
