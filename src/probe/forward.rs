use async_trait::async_trait;
use hyper::body::Bytes;
use reqwest::{Client, Proxy};
use ua_generator::ua::spoof_ua;
use url::Url;

use super::ProbeStrategy;
use crate::proxy::ProxyCandidate;

/// Requests the echo URL with the candidate installed as a classic HTTP proxy
/// (absolute-form for `http`, `CONNECT` for `https`).
#[derive(Debug, Clone, Default)]
pub struct ForwardProxy;

impl ForwardProxy {
    /// reqwest binds the proxy when the client is built, so every candidate gets its own
    /// client and connection pool. One probe makes a single request through it.
    fn client_for(candidate: &ProxyCandidate) -> anyhow::Result<Client> {
        let proxy = Proxy::all(format!("http://{}", candidate.authority()))?;
        let client = Client::builder()
            .proxy(proxy)
            .user_agent(spoof_ua())
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(client)
    }
}

#[async_trait]
impl ProbeStrategy for ForwardProxy {
    fn name(&self) -> &'static str {
        "forward-proxy"
    }

    async fn fetch(&self, candidate: &ProxyCandidate, target: &Url) -> anyhow::Result<Bytes> {
        let client = Self::client_for(candidate)?;
        let response = client.get(target.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("unexpected status {}", status);
        }
        Ok(response.bytes().await?)
    }
}
