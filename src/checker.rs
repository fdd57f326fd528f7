use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::{
    classifier::classify,
    config::Config,
    error::CheckError,
    identity::IdentityFetcher,
    probe::ProxyProbe,
    projector,
    proxy::{ProxyCandidate, VerificationResult},
};

/// Runs the baseline → probe → classify → project chain for one candidate.
/// Holds no state between checks; share it behind an `Arc`.
#[derive(Debug)]
pub struct Checker {
    fetcher: IdentityFetcher,
    probe: ProxyProbe,
    echo_url: Url,
    baseline_timeout: Duration,
    probe_timeout: Duration,
}

impl Checker {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let probe = ProxyProbe::from_kinds(&config.strategies)?;
        Checker::with_probe(config, probe)
    }

    pub fn with_probe(config: &Config, probe: ProxyProbe) -> anyhow::Result<Self> {
        Ok(Checker {
            fetcher: IdentityFetcher::new()?,
            probe,
            echo_url: config.echo_url.clone(),
            baseline_timeout: config.baseline_timeout,
            probe_timeout: config.probe_timeout,
        })
    }

    /// Verifies `candidate`. Elapsed time is measured from the start of the baseline
    /// fetch. Fails only when no baseline can be established.
    pub async fn check(
        &self,
        input: String,
        candidate: ProxyCandidate,
    ) -> Result<VerificationResult, CheckError> {
        let stime = Instant::now();

        let baseline = self
            .fetcher
            .fetch(&self.echo_url, self.baseline_timeout)
            .await?;
        let outcome = self
            .probe
            .probe(&candidate, &self.echo_url, self.probe_timeout)
            .await;
        let verdict = classify(&baseline, &outcome);

        let result = projector::project(input, candidate, baseline, outcome, verdict, stime.elapsed());
        log::info!("{}", result);
        Ok(result)
    }
}
