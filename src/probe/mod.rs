//! Routing a probe through a candidate.
//!
//! A [`ProxyProbe`] owns an ordered list of [`ProbeStrategy`] values and tries them
//! one after another until one yields a parseable identity snapshot. Failures of a
//! single strategy are recorded and never surface as errors.

use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use hyper::body::Bytes;
use tokio::time::{timeout, Instant};
use url::Url;

use crate::{identity::NetworkIdentitySnapshot, projector, proxy::ProxyCandidate};

pub mod direct;
pub mod echo_query;
pub mod forward;

#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetches `target` by way of `candidate` and returns the raw body of a 2xx answer.
    async fn fetch(&self, candidate: &ProxyCandidate, target: &Url) -> anyhow::Result<Bytes>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum StrategyKind {
    /// `http://host:port` with the echo service's host forged into the headers
    HttpDirect,
    /// `https://host:port` with the echo service's host forged into the headers
    HttpsDirect,
    /// The echo URL requested with the candidate configured as the HTTP proxy
    ForwardProxy,
    /// The echo service's own `api/v1?proxy=host:port` endpoint
    EchoQuery,
}

impl StrategyKind {
    pub const DEFAULT_ORDER: [StrategyKind; 4] = [
        StrategyKind::HttpDirect,
        StrategyKind::HttpsDirect,
        StrategyKind::ForwardProxy,
        StrategyKind::EchoQuery,
    ];

    pub fn build(self) -> anyhow::Result<Box<dyn ProbeStrategy>> {
        Ok(match self {
            StrategyKind::HttpDirect => Box::new(direct::DirectDial::http()?),
            StrategyKind::HttpsDirect => Box::new(direct::DirectDial::https()?),
            StrategyKind::ForwardProxy => Box::new(forward::ForwardProxy::default()),
            StrategyKind::EchoQuery => Box::new(echo_query::EchoQuery::new()?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyError {
    pub strategy: String,
    pub message: String,
}

impl StrategyError {
    pub fn new(strategy: &str, message: impl Into<String>) -> Self {
        StrategyError {
            strategy: strategy.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StrategyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.strategy, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Responded(NetworkIdentitySnapshot),
    /// One entry per strategy, in the order they were tried.
    NoResponse(Vec<StrategyError>),
}

pub struct ProxyProbe {
    strategies: Vec<Box<dyn ProbeStrategy>>,
}

impl ProxyProbe {
    pub fn new(strategies: Vec<Box<dyn ProbeStrategy>>) -> Self {
        ProxyProbe { strategies }
    }

    pub fn from_kinds(kinds: &[StrategyKind]) -> anyhow::Result<Self> {
        let strategies = kinds
            .iter()
            .map(|kind| kind.build())
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(ProxyProbe::new(strategies))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Tries each strategy in order, each bounded by `limit`, and stops at the first
    /// body that parses as a snapshot.
    pub async fn probe(
        &self,
        candidate: &ProxyCandidate,
        echo_url: &Url,
        limit: Duration,
    ) -> ProbeOutcome {
        let mut errors = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let stime = Instant::now();
            let message = match timeout(limit, strategy.fetch(candidate, echo_url)).await {
                Ok(Ok(body)) => match projector::parse_snapshot(&body) {
                    Ok(snapshot) => {
                        log::debug!(
                            "{} answered via {} in {:?}: {}",
                            candidate,
                            strategy.name(),
                            stime.elapsed(),
                            snapshot
                        );
                        return ProbeOutcome::Responded(snapshot);
                    }
                    Err(err) => err.to_string(),
                },
                Ok(Err(err)) => format!("{:#}", err),
                Err(_) => format!("timed out after {:?}", limit),
            };
            log::debug!("{} failed via {}: {}", candidate, strategy.name(), message);
            errors.push(StrategyError::new(strategy.name(), message));
        }

        ProbeOutcome::NoResponse(errors)
    }
}

impl std::fmt::Debug for ProxyProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyProbe")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    /// Replays a fixed answer and counts how often it was asked.
    struct Canned {
        name: &'static str,
        answer: Result<&'static str, &'static str>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl Canned {
        fn boxed(
            name: &'static str,
            answer: Result<&'static str, &'static str>,
            calls: &Arc<AtomicUsize>,
        ) -> Box<dyn ProbeStrategy> {
            Box::new(Canned {
                name,
                answer,
                delay: Duration::ZERO,
                calls: calls.clone(),
            })
        }
    }

    #[async_trait]
    impl ProbeStrategy for Canned {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _: &ProxyCandidate, _: &Url) -> anyhow::Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.answer {
                Ok(body) => Ok(Bytes::from_static(body.as_bytes())),
                Err(message) => anyhow::bail!(message),
            }
        }
    }

    fn candidate() -> ProxyCandidate {
        ProxyCandidate::new("1.2.3.4", "8080").unwrap()
    }

    fn echo() -> Url {
        Url::parse("http://echo.example/").unwrap()
    }

    #[tokio::test]
    async fn first_parseable_answer_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));
        let probe = ProxyProbe::new(vec![
            Canned::boxed("refused", Err("connection refused"), &calls),
            Canned::boxed("garbled", Ok("<html>nope</html>"), &calls),
            Canned::boxed("good", Ok(r#"{"clientIp": "5.5.5.5"}"#), &calls),
            Canned::boxed("never", Ok(r#"{"clientIp": "6.6.6.6"}"#), &last),
        ]);

        let outcome = probe
            .probe(&candidate(), &echo(), Duration::from_secs(1))
            .await;
        assert_eq!(
            outcome,
            ProbeOutcome::Responded(NetworkIdentitySnapshot::with_ip("5.5.5.5"))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(last.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_strategies_report_every_error_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = ProxyProbe::new(vec![
            Canned::boxed("a", Err("dns failure"), &calls),
            Canned::boxed("b", Ok("not json"), &calls),
        ]);

        match probe.probe(&candidate(), &echo(), Duration::from_secs(1)).await {
            ProbeOutcome::NoResponse(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0], StrategyError::new("a", "dns failure"));
                assert_eq!(errors[1].strategy, "b");
                assert!(errors[1].message.starts_with("malformed response"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_strategy_times_out_and_falls_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = ProxyProbe::new(vec![
            Box::new(Canned {
                name: "slow",
                answer: Ok(r#"{"clientIp": "7.7.7.7"}"#),
                delay: Duration::from_secs(5),
                calls: calls.clone(),
            }),
            Canned::boxed("fast", Ok(r#"{"ip": "8.8.8.8"}"#), &calls),
        ]);

        let outcome = probe
            .probe(&candidate(), &echo(), Duration::from_millis(50))
            .await;
        assert_eq!(
            outcome,
            ProbeOutcome::Responded(NetworkIdentitySnapshot::with_ip("8.8.8.8"))
        );
    }

    #[test]
    fn default_order_builds() {
        let probe = ProxyProbe::from_kinds(&StrategyKind::DEFAULT_ORDER).unwrap();
        assert_eq!(
            probe.strategy_names(),
            vec!["http-direct", "https-direct", "forward-proxy", "echo-query"]
        );
    }
}
