use std::{net::SocketAddr, process, sync::Arc};

use anyhow::Context;
use argument::{BatchArgs, CheckArgs, Cli, Commands, ServeArgs};
use batch::{BatchOrchestrator, BatchResult};
use checker::Checker;
use clap::Parser;
use config::Config;
use proxy::{ProxyCandidate, VerificationResult};
use tokio::{fs, io::AsyncReadExt, runtime};
use tokio_util::sync::CancellationToken;
use utils::{
    logger::{parse_level, setup_logger},
    serializer::{ApiBatch, ApiResult},
};

mod argument;
mod batch;
mod checker;
mod classifier;
mod config;
mod error;
mod identity;
mod probe;
mod projector;
mod proxy;
mod server;
mod utils;


fn print_result(result: &VerificationResult, format: &str) {
    match format {
        "text" => println!("{} {}", result.input, result.status()),
        "json" => match serde_json::to_string(&ApiResult::from(result)) {
            Ok(line) => println!("{}", line),
            Err(err) => log::error!("{}", err),
        },
        _ => println!("{}", result),
    }
}

fn print_batch(batch: &BatchResult, format: &str) {
    if format == "json" {
        match serde_json::to_string_pretty(&ApiBatch::from(batch)) {
            Ok(body) => println!("{}", body),
            Err(err) => log::error!("{}", err),
        }
        return;
    }
    for result in &batch.results {
        print_result(result, format);
    }
    if batch.truncated() {
        log::warn!(
            "{} of {} candidates were not checked",
            batch.total_requested - batch.total_processed,
            batch.total_requested
        );
    }
}

async fn handle_serve_command(config: Config, args: ServeArgs) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;
    let config = Config {
        listen_addr: addr,
        ..config
    };

    let checker = Arc::new(Checker::new(&config)?);
    let state = server::AppState::new(checker, config.max_candidates, config.concurrency);
    let server = server::Server::new(config.listen_addr, state);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutting down..");
            signal.cancel();
        }
    });
    server.start(shutdown).await
}

async fn handle_check_command(config: Config, args: CheckArgs) -> anyhow::Result<()> {
    let candidate = ProxyCandidate::new(&args.host, &args.port)?;
    let checker = Checker::new(&config)?;
    let result = checker.check(candidate.to_string(), candidate).await?;
    print_result(&result, &args.format);
    Ok(())
}

async fn handle_batch_command(config: Config, args: BatchArgs) -> anyhow::Result<()> {
    let mut entries = vec![];
    if args.files.is_empty() {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("failed to read stdin")?;
        entries.push(raw);
    }
    for file in &args.files {
        match fs::read_to_string(file).await {
            Ok(raw) => entries.push(raw),
            Err(e) => log::error!("{}: {:?}", e, file),
        }
    }

    let checker = Arc::new(Checker::new(&config)?);
    let orchestrator = BatchOrchestrator::new(checker, config.max_candidates, config.concurrency);

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Cancelling, remaining candidates are skipped");
            signal.cancel();
        }
    });

    let batch = orchestrator.run_batch(&entries.join("\n"), &cancel).await;
    if batch.total_requested == 0 {
        anyhow::bail!("no candidates found in input");
    }
    print_batch(&batch, &args.format);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = setup_logger(Some(parse_level(&cli.log_level))) {
        eprintln!("unable to set up logging: {:?}", err);
    }

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{:#}", err);
            process::exit(2);
        }
    };
    log::debug!("{:?}", config);

    let runtime = match runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("unable to start the async runtime: {}", err);
            process::exit(1);
        }
    };

    let outcome = runtime.block_on(async move {
        match cli.sub {
            Commands::Serve(args) => handle_serve_command(config, args).await,
            Commands::Check(args) => handle_check_command(config, args).await,
            Commands::Batch(args) => handle_batch_command(config, args).await,
        }
    });

    if let Err(err) = outcome {
        log::error!("{:#}", err);
        process::exit(1);
    }
}
