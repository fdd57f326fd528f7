//! Verifying a bounded list of candidates.
//!
//! Raw input is split on newlines and commas into tokens, capped, and every token
//! yields exactly one [`VerificationResult`], in input order. A token that cannot be
//! read as `host:port` or `host,port` becomes an INVALID_FORMAT entry without
//! costing a probe, and a failing check is recorded on its own entry.

use std::{net::Ipv6Addr, panic::AssertUnwindSafe, sync::Arc};

use futures_util::{stream, FutureExt, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    checker::Checker,
    error::CheckError,
    proxy::{ProxyCandidate, VerificationResult},
    utils::elapsed_ms,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub results: Vec<VerificationResult>,
    /// Tokens found in the input, including those dropped by the cap.
    pub total_requested: usize,
    pub total_processed: usize,
    pub total_elapsed_ms: u64,
}

impl BatchResult {
    pub fn truncated(&self) -> bool {
        self.total_requested > self.total_processed
    }
}

/// Splits a raw list into trimmed, non-empty tokens.
///
/// Lines holding a `:` are split further on commas and whitespace, so
/// `"1.2.3.4:80, 5.6.7.8:81"` is two tokens. A line without `:` is kept whole,
/// so `"5.6.7.8,443"` stays one `host,port` token, and so is a line that is a
/// single IPv6 `host,port` pair such as `"2001:db8::1,8080"`.
pub fn tokenize(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| {
            if line.contains(':') && ipv6_comma_pair(line).is_none() {
                line.split(|c: char| c == ',' || c.is_whitespace())
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            } else {
                vec![line.to_string()]
            }
        })
        .collect()
}

/// `"2001:db8::1,8080"` as host and port. A bare IPv6 host never splits on `:`.
fn ipv6_comma_pair(token: &str) -> Option<(&str, &str)> {
    let (host, port) = token.rsplit_once(',')?;
    let host = host.trim();
    let unbracketed = host.trim_start_matches('[').trim_end_matches(']');
    unbracketed.parse::<Ipv6Addr>().ok()?;
    Some((host, port))
}

/// Reads a token as `host:port`, falling back to `host,port`.
pub fn parse_token(token: &str) -> Result<ProxyCandidate, CheckError> {
    let token = token.trim();
    let bare = token
        .strip_prefix("http://")
        .or_else(|| token.strip_prefix("https://"))
        .unwrap_or(token)
        .trim_end_matches('/');

    let (host, port) = ipv6_comma_pair(bare)
        .or_else(|| bare.rsplit_once(':'))
        .or_else(|| bare.split_once(','))
        .ok_or_else(|| CheckError::InvalidFormat(token.to_string()))?;
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    let port = port.trim();
    if host.is_empty() || port.is_empty() {
        return Err(CheckError::InvalidFormat(token.to_string()));
    }
    ProxyCandidate::new(host, port)
}

#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    checker: Arc<Checker>,
    max_candidates: usize,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(checker: Arc<Checker>, max_candidates: usize, concurrency: usize) -> Self {
        BatchOrchestrator {
            checker,
            max_candidates,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run_batch(&self, raw: &str, cancel: &CancellationToken) -> BatchResult {
        self.run_tokens(tokenize(raw), cancel).await
    }

    /// Like [`run_batch`](Self::run_batch) for input that arrives pre-split, e.g. a JSON array.
    /// Entries are tokenized individually.
    pub async fn run_entries(&self, entries: &[String], cancel: &CancellationToken) -> BatchResult {
        let tokens = entries.iter().flat_map(|entry| tokenize(entry)).collect();
        self.run_tokens(tokens, cancel).await
    }

    pub async fn run_tokens(&self, mut tokens: Vec<String>, cancel: &CancellationToken) -> BatchResult {
        let stime = Instant::now();
        let total_requested = tokens.len();
        if total_requested > self.max_candidates {
            log::warn!(
                "{} candidates requested, only the first {} are checked",
                total_requested,
                self.max_candidates
            );
            tokens.truncate(self.max_candidates);
        }

        // `buffered` keeps input order and bounds the number of checks in flight
        let results: Vec<VerificationResult> = stream::iter(tokens)
            .map(|token| self.verify_token(token, cancel))
            .buffered(self.concurrency)
            .collect()
            .await;

        let batch = BatchResult {
            total_requested,
            total_processed: results.len(),
            results,
            total_elapsed_ms: elapsed_ms(stime),
        };
        log::info!(
            "Finished checking {} of {} candidates. Runtime {}ms",
            batch.total_processed,
            batch.total_requested,
            batch.total_elapsed_ms
        );
        batch
    }

    async fn verify_token(&self, token: String, cancel: &CancellationToken) -> VerificationResult {
        let candidate = match parse_token(&token) {
            Ok(candidate) => candidate,
            Err(err) => {
                log::warn!("skipping {:?}: {}", token, err);
                return VerificationResult::invalid_format(token, &err);
            }
        };
        if cancel.is_cancelled() {
            return VerificationResult::failed(token, candidate, "cancelled".to_string(), 0);
        }

        let stime = Instant::now();
        let check = AssertUnwindSafe(self.checker.check(token.clone(), candidate.clone()));
        match check.catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                log::warn!("{} could not be checked: {}", candidate, err);
                VerificationResult::failed(token, candidate, err.to_string(), elapsed_ms(stime))
            }
            Err(_) => {
                log::error!("check of {} panicked", candidate);
                VerificationResult::failed(
                    token,
                    candidate,
                    "internal error while checking".to_string(),
                    elapsed_ms(stime),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_mixed_delimiters() {
        assert_eq!(
            tokenize("1.2.3.4:80\nnotaproxy\n5.6.7.8,443"),
            vec!["1.2.3.4:80", "notaproxy", "5.6.7.8,443"]
        );
        assert_eq!(
            tokenize("  1.1.1.1:80, 2.2.2.2:81\r\n\n\t3.3.3.3:82 4.4.4.4:83  \n"),
            vec!["1.1.1.1:80", "2.2.2.2:81", "3.3.3.3:82", "4.4.4.4:83"]
        );
        assert!(tokenize(" \n\r\n ").is_empty());
    }

    #[test]
    fn parse_colon_and_comma_forms() {
        let candidate = parse_token("1.2.3.4:80").unwrap();
        assert_eq!((candidate.host.as_str(), candidate.port.as_str()), ("1.2.3.4", "80"));

        let candidate = parse_token(" 5.6.7.8 , 443 ").unwrap();
        assert_eq!((candidate.host.as_str(), candidate.port.as_str()), ("5.6.7.8", "443"));

        let candidate = parse_token("http://proxy.example:3128/").unwrap();
        assert_eq!(candidate.to_string(), "proxy.example:3128");

        let candidate = parse_token("[2001:db8::1]:8080").unwrap();
        assert_eq!(candidate.host, "2001:db8::1");
        assert_eq!(candidate.to_string(), "[2001:db8::1]:8080");
    }

    #[test]
    fn ipv6_comma_pair_is_one_candidate() {
        assert_eq!(
            tokenize("2001:db8::1,8080\n[2001:db8::2], 3128\n1.1.1.1:80,2.2.2.2:81"),
            vec!["2001:db8::1,8080", "[2001:db8::2], 3128", "1.1.1.1:80", "2.2.2.2:81"]
        );

        let candidate = parse_token("2001:db8::1,8080").unwrap();
        assert_eq!((candidate.host.as_str(), candidate.port.as_str()), ("2001:db8::1", "8080"));
        let candidate = parse_token("[2001:db8::2], 3128").unwrap();
        assert_eq!(candidate.to_string(), "[2001:db8::2]:3128");
    }

    #[test]
    fn parse_rejects_single_component() {
        for token in ["notaproxy", "1.2.3.4:", ":80", ",443", "host,", ""] {
            assert!(
                matches!(parse_token(token), Err(CheckError::InvalidFormat(_))),
                "{:?} should be invalid",
                token
            );
        }
    }

    #[test]
    fn ports_stay_opaque() {
        let candidate = parse_token("proxy.example:http-alt").unwrap();
        assert_eq!(candidate.port, "http-alt");
    }
}
