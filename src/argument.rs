use std::path::PathBuf;

use clap::builder::PossibleValue;
use clap::{Args, Parser, Subcommand};

use crate::{
    config::{DEFAULT_BASELINE_TIMEOUT, DEFAULT_ECHO_URL, DEFAULT_PROBE_TIMEOUT, MAX_CANDIDATES},
    probe::StrategyKind,
};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    /// Identity echo service queried for the baseline and through each candidate
    #[arg(long, default_value = DEFAULT_ECHO_URL)]
    pub echo_url: String,

    /// Time in seconds before giving up on the baseline fetch
    #[arg(short, long, default_value_t = DEFAULT_BASELINE_TIMEOUT)]
    pub timeout: u64,

    /// Time in seconds each probe strategy may take
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT)]
    pub probe_timeout: u64,

    /// The maximum number of candidates checked per batch; the rest are dropped
    #[arg(long, default_value_t = MAX_CANDIDATES)]
    pub max_candidates: usize,

    /// The maximum number of candidates of one batch checked at the same time
    #[arg(long, default_value = "1")]
    pub concurrency: usize,

    /// Probe strategies in the order they are tried [default: all, in the listed order]
    #[arg(long, value_enum, value_delimiter = ',')]
    pub strategies: Vec<StrategyKind>,

    /// Logging level
    #[arg(long = "log", default_value = "info",
        value_parser([
            PossibleValue::new("debug"),
            PossibleValue::new("info"),
            PossibleValue::new("warn"),
            PossibleValue::new("error")
        ])
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub sub: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the verification API over HTTP
    Serve(ServeArgs),

    /// Verify a single proxy
    Check(CheckArgs),

    /// Verify a list of proxies read from files or stdin
    Batch(BatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8787")]
    pub port: u16,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Proxy host or IP address
    pub host: String,

    /// Proxy port
    pub port: String,

    /// Flag indicating in what format the results will be presented.
    #[arg(short, long,
        default_value = "default",
        value_parser([
            PossibleValue::new("default"),
            PossibleValue::new("text"),
            PossibleValue::new("json")
        ])
    )]
    pub format: String,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Files with one or more `host:port` / `host,port` entries per line. Reads stdin when omitted
    pub files: Vec<PathBuf>,

    /// Flag indicating in what format the results will be presented.
    #[arg(short, long,
        default_value = "default",
        value_parser([
            PossibleValue::new("default"),
            PossibleValue::new("text"),
            PossibleValue::new("json")
        ])
    )]
    pub format: String,
}
