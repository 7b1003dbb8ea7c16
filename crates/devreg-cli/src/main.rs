//! Command-line interface for the IoT device registry.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devreg_api::{ContextRegistry, DeviceContextSource, ServerState};
use devreg_core::config::{ServiceConfig, env_vars};
use devreg_core::{TelemetryBus, TelemetryReceiver};
use devreg_storage::DeviceStore;

/// IoT device registry - devices, device models and their reported values.
#[derive(Parser, Debug)]
#[command(name = "devreg")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Store file (overrides DEVREG_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the NGSI-LD server.
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to bind to (overrides SERVICE_PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List the controlled property catalog.
    Catalog,
    /// List registered device models.
    Models,
    /// Print the current value of every device.
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServiceConfig::from_env();
    if let Some(db) = args.db {
        config.db_path = db;
    }

    init_logging(config.log_json, args.verbose);

    match args.command {
        Command::Serve { host, port } => {
            if let Some(port) = port {
                config.port = port;
            }
            run_server(host, config).await
        }
        Command::Catalog => list_catalog(&config).await,
        Command::Models => list_models(&config).await,
        Command::Devices => list_devices(&config).await,
    }
}

fn init_logging(json_logging: bool, verbose: bool) {
    let default_directive = if verbose { "devreg=debug" } else { "devreg=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(default_directive)
            .add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        // JSON format for container environments
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }
}

/// Open the store, retrying with a fixed backoff.
async fn open_store(config: &ServiceConfig) -> Result<Arc<DeviceStore>> {
    let mut attempt = 1;
    loop {
        let path = config.db_path.clone();
        let opened = tokio::task::spawn_blocking(move || DeviceStore::open(path)).await?;
        match opened {
            Ok(store) => return Ok(store),
            Err(e) if attempt < config.connect_attempts => {
                tracing::warn!(
                    attempt,
                    path = %config.db_path.display(),
                    error = %e,
                    "Failed to open device store, retrying in {:?}",
                    config.connect_backoff
                );
                attempt += 1;
                tokio::time::sleep(config.connect_backoff).await;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Failed to open device store at {} (set {} to change it)",
                        config.db_path.display(),
                        env_vars::DB_PATH
                    )
                });
            }
        }
    }
}

/// Log every telemetry message until the bus closes.
async fn log_telemetry(mut rx: TelemetryReceiver) {
    while let Some(message) = rx.recv().await {
        match message.body() {
            Ok(body) => tracing::info!(topic = message.topic(), %body, "Telemetry published"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize telemetry message"),
        }
    }
}

async fn run_server(host: String, config: ServiceConfig) -> Result<()> {
    let bind: SocketAddr = format!("{}:{}", host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, config.port))?;

    let store = open_store(&config).await?;

    let bus = TelemetryBus::new();
    tokio::spawn(log_telemetry(bus.subscribe()));

    let source = DeviceContextSource::new(store, Arc::new(bus), config.telemetry.clone());
    let mut registry = ContextRegistry::new();
    registry.register(Arc::new(source));

    devreg_api::run(bind, ServerState::new(registry)).await
}

async fn list_catalog(config: &ServiceConfig) -> Result<()> {
    let store = open_store(config).await?;
    for property in store.catalog().all() {
        let abbreviation = if property.is_state() {
            "(bare)"
        } else {
            property.abbreviation.as_str()
        };
        println!("{:>3}  {:<16} {}", property.id, property.name, abbreviation);
    }
    Ok(())
}

async fn list_models(config: &ServiceConfig) -> Result<()> {
    let store = open_store(config).await?;
    let models = tokio::task::spawn_blocking(move || store.list_device_models()).await??;
    for model in models {
        println!(
            "{}  [{}]  {}",
            model.external_model_id,
            model.category,
            model.controlled_property_names().join(", ")
        );
    }
    Ok(())
}

async fn list_devices(config: &ServiceConfig) -> Result<()> {
    let store = open_store(config).await?;
    let states = tokio::task::spawn_blocking(move || store.current_state_of_all()).await??;
    for state in states {
        let reported = state
            .last_reported_at()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}  {}  (last reported {})",
            state.device.external_device_id, state.value, reported
        );
    }
    Ok(())
}
