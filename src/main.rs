use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use ota_candidates::catalog::registries::DclCatalog;
use ota_candidates::catalog::registry::VersionCatalog;
use ota_candidates::config::{self, EngineConfig};
use ota_candidates::engine::{Dispatcher, spawn_refresh_timer};
use ota_candidates::logging;

#[derive(Parser)]
#[command(name = "ota-candidates")]
#[command(version, about = "Resolve firmware update candidates from the compliance ledger")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write JSON logs to the data directory instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the update candidate for one device
    Lookup {
        #[arg(value_parser = parse_u16)]
        vendor_id: u16,
        #[arg(value_parser = parse_u16)]
        product_id: u16,
        current_version: u32,
    },
    /// List the software versions published for a device model
    Versions {
        #[arg(value_parser = parse_u16)]
        vendor_id: u16,
        #[arg(value_parser = parse_u16)]
        product_id: u16,
    },
    /// Answer `<vendor> <product> <current>` lines from stdin, refreshing periodically
    Serve,
}

/// Accepts decimal or `0x`-prefixed hexadecimal ids
fn parse_u16(value: &str) -> Result<u16, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid id '{}': {}", value, e))
}

/// Parses one `serve` input line
fn parse_query(line: &str) -> Option<(u16, u16, u32)> {
    let mut fields = line.split_whitespace();
    let vendor_id = parse_u16(fields.next()?).ok()?;
    let product_id = parse_u16(fields.next()?).ok()?;
    let current_version = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((vendor_id, product_id, current_version))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.then(config::log_path);
    let _guard = logging::init(log_path.as_deref())?;

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, config))
}

async fn run(command: Command, config: EngineConfig) -> anyhow::Result<()> {
    let catalog = Arc::new(DclCatalog::from_config(&config.catalog)?);
    info!("Using catalog at {}", config.catalog.resolved_base_url());

    match command {
        Command::Lookup {
            vendor_id,
            product_id,
            current_version,
        } => {
            let (dispatcher, worker) = Dispatcher::from_config(&config, catalog)?;
            let outcome = dispatcher
                .fetch(vendor_id, product_id, current_version)
                .await?;
            drop(dispatcher);
            worker.await?;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Versions {
            vendor_id,
            product_id,
        } => {
            let mut versions = catalog.list_versions(vendor_id, product_id).await?;
            versions.sort_unstable();

            println!("{}", serde_json::to_string(&versions)?);
        }
        Command::Serve => serve(config, catalog).await?,
    }

    Ok(())
}

async fn serve(config: EngineConfig, catalog: Arc<DclCatalog>) -> anyhow::Result<()> {
    let (dispatcher, worker) = Dispatcher::from_config(&config, catalog)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let timer = spawn_refresh_timer(
        dispatcher.clone(),
        Duration::from_millis(config.refresh_interval),
        shutdown_rx,
    );

    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down");
    };
    let interrupted =
        answer_queries(&dispatcher, BufReader::new(tokio::io::stdin()), ctrl_c).await?;

    let _ = shutdown_tx.send(true);
    timer.await?;
    drop(dispatcher);
    if interrupted {
        // Queued lookups are dropped
        worker.abort();
    } else {
        worker.await?;
    }

    Ok(())
}

/// Submits one lookup per input line until the input closes or `shutdown`
/// completes. Returns true when stopped by `shutdown`.
///
/// Submissions wait for queue space, so `shutdown` is raced against both the
/// read and the enqueue.
async fn answer_queries<R>(
    dispatcher: &Dispatcher,
    input: R,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    tokio::pin!(shutdown);
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => return Ok(true),
        };
        let Some(line) = line else {
            return Ok(false);
        };
        if line.trim().is_empty() {
            continue;
        }

        let Some((vendor_id, product_id, current_version)) = parse_query(&line) else {
            warn!("Ignoring malformed query: {}", line);
            continue;
        };

        let submission =
            dispatcher.resolve(vendor_id, product_id, current_version, move |outcome| {
                let response = serde_json::json!({
                    "vendorId": vendor_id,
                    "productId": product_id,
                    "currentVersion": current_version,
                    "outcome": outcome,
                });
                println!("{}", response);
            });
        tokio::select! {
            result = submission => result?,
            _ = &mut shutdown => return Ok(true),
        }
    }
}
