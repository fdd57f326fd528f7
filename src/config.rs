use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use url::Url;

use crate::{argument::Cli, error_context, probe::StrategyKind};

pub const DEFAULT_ECHO_URL: &str = "https://myapicheck.mayumiapi.workers.dev/";

// in seconds
pub const DEFAULT_BASELINE_TIMEOUT: u64 = 8;
pub const DEFAULT_PROBE_TIMEOUT: u64 = 5;

pub const MAX_CANDIDATES: usize = 50;

/// Largest batch request body accepted, in bytes.
pub const MAX_BATCH_BODY: usize = 64 * 1024;

pub const DEFAULT_LISTEN_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8787);

#[derive(Debug, Clone)]
pub struct Config {
    /// Echo service used for the baseline and as the probe target.
    pub echo_url: Url,
    pub baseline_timeout: Duration,
    /// Budget for each individual strategy, not the whole probe.
    pub probe_timeout: Duration,
    pub max_candidates: usize,
    /// Candidates probed at once within a batch. 1 means strictly sequential.
    pub concurrency: usize,
    pub strategies: Vec<StrategyKind>,
    pub listen_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            echo_url: Url::parse(DEFAULT_ECHO_URL).expect("default echo url is valid"),
            baseline_timeout: Duration::from_secs(DEFAULT_BASELINE_TIMEOUT),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT),
            max_candidates: MAX_CANDIDATES,
            concurrency: 1,
            strategies: StrategyKind::DEFAULT_ORDER.to_vec(),
            listen_addr: SocketAddr::from(DEFAULT_LISTEN_ADDR),
        }
    }
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let echo_url = Url::parse(&cli.echo_url)
            .with_context(|| format!("invalid echo url {}", cli.echo_url))?;
        let strategies = if cli.strategies.is_empty() {
            StrategyKind::DEFAULT_ORDER.to_vec()
        } else {
            cli.strategies.clone()
        };

        let config = Config {
            echo_url,
            baseline_timeout: Duration::from_secs(cli.timeout),
            probe_timeout: Duration::from_secs(cli.probe_timeout),
            max_candidates: cli.max_candidates,
            concurrency: cli.concurrency,
            strategies,
            ..Default::default()
        };
        config.validate().context(error_context!())?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.echo_url.scheme(), "http" | "https") || !self.echo_url.has_host() {
            anyhow::bail!("echo url must be an http(s) url with a host: {}", self.echo_url);
        }
        if self.baseline_timeout.is_zero() || self.probe_timeout.is_zero() {
            anyhow::bail!("timeouts must be greater than zero");
        }
        if self.max_candidates == 0 {
            anyhow::bail!("max candidates must be greater than zero");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }
        if self.strategies.is_empty() {
            anyhow::bail!("at least one probe strategy is required");
        }
        for (i, kind) in self.strategies.iter().enumerate() {
            if self.strategies[..i].contains(kind) {
                anyhow::bail!("probe strategy {:?} listed twice", kind);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_candidates, 50);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.strategies.len(), 4);
    }

    #[test]
    fn cli_overrides_defaults() {
        let cli = Cli::parse_from([
            "proxy-verifier",
            "--echo-url",
            "http://127.0.0.1:9000/",
            "--probe-timeout",
            "2",
            "--strategies",
            "echo-query,http-direct",
            "serve",
        ]);
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.echo_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
        assert_eq!(
            config.strategies,
            vec![StrategyKind::EchoQuery, StrategyKind::HttpDirect]
        );
    }

    #[test]
    fn rejects_nonsense() {
        let mut config = Config {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.concurrency = 1;
        config.strategies = vec![StrategyKind::HttpDirect, StrategyKind::HttpDirect];
        assert!(config.validate().is_err());

        config.strategies = vec![];
        assert!(config.validate().is_err());

        config = Config {
            echo_url: Url::parse("ftp://echo.example/").unwrap(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = Config {
            probe_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
