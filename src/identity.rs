use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use url::Url;

use crate::{
    error::CheckError,
    projector,
    utils::http::{build_get_request, hyper_client, read_success_body, HttpsClient},
};

/// Network identity as reported by an identity echo service.
/// `None` means the service did not report the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdentitySnapshot {
    pub observed_ip: Option<String>,
    pub asn: Option<u32>,
    pub organization: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region_code: Option<String>,
    pub timezone: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub colo: Option<String>,
    pub tls_version: Option<String>,
    pub client_tcp_rtt: Option<String>,
}

impl NetworkIdentitySnapshot {
    pub fn with_ip(ip: &str) -> Self {
        NetworkIdentitySnapshot {
            observed_ip: Some(ip.to_string()),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for NetworkIdentitySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Identity {} AS{} {}>",
            self.observed_ip.as_deref().unwrap_or("?"),
            self.asn.map(|asn| asn.to_string()).unwrap_or_else(|| "?".into()),
            self.country.as_deref().unwrap_or("--")
        )
    }
}

/// Fetches the caller's own identity from an echo service. Never retries.
#[derive(Debug, Clone)]
pub struct IdentityFetcher {
    client: HttpsClient,
}

impl IdentityFetcher {
    pub fn new() -> anyhow::Result<Self> {
        Ok(IdentityFetcher {
            client: hyper_client()?,
        })
    }

    pub async fn fetch(
        &self,
        echo_url: &Url,
        limit: Duration,
    ) -> Result<NetworkIdentitySnapshot, CheckError> {
        let request = build_get_request(echo_url.as_str(), None)
            .map_err(|err| CheckError::UpstreamUnavailable(format!("{:#}", err)))?;

        let body = match timeout(limit, read_success_body(&self.client, request)).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => return Err(CheckError::UpstreamUnavailable(format!("{:#}", err))),
            Err(_) => {
                return Err(CheckError::UpstreamUnavailable(format!(
                    "no answer from {} within {:?}",
                    echo_url, limit
                )))
            }
        };

        let snapshot = projector::parse_snapshot(&body)?;
        if snapshot.observed_ip.is_none() {
            return Err(CheckError::MalformedResponse(format!(
                "{} did not report an ip address",
                echo_url
            )));
        }
        log::debug!("baseline {} retrieved using {}", snapshot, echo_url);
        Ok(snapshot)
    }
}
