use alertfold::socketio::{self, SocketConfig};
use alertfold::transport::forward_ndjson;
use alertfold::{Config, Converter, RateTable, Relay, Session};
use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often the binary checks that the dispatcher is still alive.
const DISPATCHER_CHECK: Duration = Duration::from_secs(1);

/// Relay Streamlabs alerts into a running total and overlay text files.
#[derive(Debug, Parser)]
#[command(name = "alertfold", version, about)]
struct Args {
    /// Configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, env = "ALERTFOLD_LOG", default_value = "info")]
    log_level: String,

    /// Read newline-delimited JSON events from FILE ("-" for stdin) instead
    /// of connecting to Streamlabs, then exit.
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let converter = match &config.currency {
        None => Converter::passthrough(),
        Some(currency) => {
            let rates = match &config.exchange {
                Some(table) => table.clone(),
                None => {
                    info!("fetching {currency} exchange rates from {}", config.rates_url);
                    RateTable::fetch(&config.rates_url, currency)?
                }
            };
            Converter::new(currency.clone(), rates)
        }
    };

    let session = Session::from_config(&config, converter)?;
    let relay = Relay::start(session, Some(config.watch_debounce()))
        .context("starting the relay")?;

    match args.replay {
        Some(path) => {
            let sink = relay.sender();
            let count = if path.as_os_str() == "-" {
                forward_ndjson(io::stdin().lock(), &sink)?
            } else {
                let file = File::open(&path)
                    .with_context(|| format!("opening {}", path.display()))?;
                forward_ndjson(BufReader::new(file), &sink)?
            };
            info!("replayed {count} event(s)");
        }
        None => {
            let Some(token) = config.token.clone() else {
                bail!("`token` must be set in {} to connect to Streamlabs", args.config.display());
            };
            let socket = SocketConfig::new(config.socket_url.clone(), token);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("starting the async runtime")?;

            runtime.block_on(async {
                let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
                let mut client = tokio::spawn(socketio::run(socket, relay.sender(), stop_rx));

                let dispatcher_stopped = async {
                    let mut check = tokio::time::interval(DISPATCHER_CHECK);
                    while relay.is_running() {
                        check.tick().await;
                    }
                };

                let client_done = tokio::select! {
                    signal = tokio::signal::ctrl_c() => {
                        signal.context("waiting for the interrupt signal")?;
                        info!("interrupted, shutting down");
                        false
                    }
                    _ = dispatcher_stopped => {
                        warn!("relay stopped, disconnecting");
                        false
                    }
                    _ = &mut client => {
                        warn!("socket client stopped");
                        true
                    }
                };

                let _ = stop_tx.send(true);
                if !client_done {
                    let _ = client.await;
                }
                anyhow::Ok(())
            })?;
        }
    }

    let session = relay.close()?;
    info!(
        "relay stopped with total {}",
        session.store().get_or(alertfold::TOTAL_PATH, serde_json::json!(0))
    );
    Ok(())
}
