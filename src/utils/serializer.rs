//! Wire shapes of the HTTP API and the `json` output format.

use serde::Serialize;

use crate::{
    batch::BatchResult, classifier::Verdict, error::CheckError,
    identity::NetworkIdentitySnapshot, proxy::VerificationResult,
};

pub const UNKNOWN: &str = "unknown";

/// An enrichment field: the upstream value, or `"unknown"` when it was not reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Enrichment<T> {
    Known(T),
    Unknown(&'static str),
}

impl<T> From<Option<T>> for Enrichment<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Enrichment::Known(value),
            None => Enrichment::Unknown(UNKNOWN),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult {
    pub status: &'static str,
    pub ip: String,
    pub port: String,
    pub proxy_ip: Enrichment<String>,
    pub country: Enrichment<String>,
    pub city: Enrichment<String>,
    pub region_code: Enrichment<String>,
    pub asn: Enrichment<u32>,
    pub organization: Enrichment<String>,
    pub colo: Enrichment<String>,
    pub timezone: Enrichment<String>,
    pub latitude: Enrichment<String>,
    pub longitude: Enrichment<String>,
    pub tls_version: Enrichment<String>,
    pub check_delay: String,
    pub delay_ms: u64,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&VerificationResult> for ApiResult {
    fn from(result: &VerificationResult) -> Self {
        let (ip, port) = match &result.candidate {
            Some(candidate) => (candidate.host.clone(), candidate.port.clone()),
            None => (result.input.clone(), String::new()),
        };
        let probe = result.probe_identity.clone().unwrap_or_default();
        let NetworkIdentitySnapshot {
            observed_ip,
            asn,
            organization,
            country,
            city,
            region_code,
            timezone,
            latitude,
            longitude,
            colo,
            tls_version,
            client_tcp_rtt: _,
        } = probe;
        let message = match result.verdict {
            Some(verdict) => verdict.message(),
            None => "entry is neither host:port nor host,port",
        };

        ApiResult {
            status: result.status(),
            ip,
            port,
            proxy_ip: observed_ip.into(),
            country: country.into(),
            city: city.into(),
            region_code: region_code.into(),
            asn: asn.into(),
            organization: organization.into(),
            colo: colo.into(),
            timezone: timezone.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
            tls_version: tls_version.into(),
            check_delay: format!("{} ms", result.elapsed_ms),
            delay_ms: result.elapsed_ms,
            message,
            error: result.errors.as_ref().map(|errors| {
                // the probe itself ran and every strategy failed
                if result.verdict == Some(Verdict::Unreachable) && result.baseline_identity.is_some() {
                    CheckError::ProbeUnreachable(errors.clone()).to_string()
                } else {
                    errors.join("; ")
                }
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBatch {
    pub results: Vec<ApiResult>,
    pub total_proxies: usize,
    pub total_requested: usize,
    pub total_processed: usize,
    pub total_time: String,
}

impl From<&BatchResult> for ApiBatch {
    fn from(batch: &BatchResult) -> Self {
        ApiBatch {
            results: batch.results.iter().map(ApiResult::from).collect(),
            total_proxies: batch.total_processed,
            total_requested: batch.total_requested,
            total_processed: batch.total_processed,
            total_time: format!("{} ms", batch.total_elapsed_ms),
        }
    }
}
