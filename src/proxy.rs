use serde::Serialize;

use crate::{
    classifier::Verdict, error::CheckError, identity::NetworkIdentitySnapshot,
    utils::http::authority,
};

/// A proxy to verify. Host and port are opaque to this crate and handed to the network layer as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyCandidate {
    pub host: String,
    pub port: String,
}

impl ProxyCandidate {
    pub fn new(host: &str, port: &str) -> Result<Self, CheckError> {
        let host = host.trim();
        let port = port.trim();
        if host.is_empty() {
            return Err(CheckError::MissingParameter("ip"));
        }
        if port.is_empty() {
            return Err(CheckError::MissingParameter("port"));
        }
        Ok(ProxyCandidate {
            host: host.to_string(),
            port: port.to_string(),
        })
    }

    pub fn authority(&self) -> String {
        authority(&self.host, &self.port)
    }
}

impl std::fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.authority())
    }
}

/// Outcome of verifying one candidate. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Token the candidate was read from.
    pub input: String,
    /// `None` when `input` could not be read as a candidate.
    pub candidate: Option<ProxyCandidate>,
    /// `None` for INVALID_FORMAT entries.
    pub verdict: Option<Verdict>,
    pub baseline_identity: Option<NetworkIdentitySnapshot>,
    pub probe_identity: Option<NetworkIdentitySnapshot>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl VerificationResult {
    pub const INVALID_FORMAT: &'static str = "INVALID_FORMAT";

    pub fn invalid_format(input: String, error: &CheckError) -> Self {
        VerificationResult {
            input,
            candidate: None,
            verdict: None,
            baseline_identity: None,
            probe_identity: None,
            elapsed_ms: 0,
            errors: Some(vec![error.to_string()]),
        }
    }

    /// A candidate whose check could not complete, e.g. the baseline fetch failed.
    pub fn failed(input: String, candidate: ProxyCandidate, error: String, elapsed_ms: u64) -> Self {
        VerificationResult {
            input,
            candidate: Some(candidate),
            verdict: Some(Verdict::Unreachable),
            baseline_identity: None,
            probe_identity: None,
            elapsed_ms,
            errors: Some(vec![error]),
        }
    }

    pub fn status(&self) -> &'static str {
        self.verdict
            .map(Verdict::as_str)
            .unwrap_or(Self::INVALID_FORMAT)
    }
}

impl std::fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let egress = self
            .probe_identity
            .as_ref()
            .and_then(|identity| identity.observed_ip.as_deref())
            .unwrap_or("-");
        let country = self
            .probe_identity
            .as_ref()
            .and_then(|identity| identity.country.as_deref())
            .unwrap_or("--");
        write!(
            f,
            "<Proxy {} {} {} {}ms {}>",
            self.status(),
            country,
            egress,
            self.elapsed_ms,
            self.input
        )
    }
}
