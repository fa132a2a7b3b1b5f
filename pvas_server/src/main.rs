//! # PVAS Demo Server
//!
//! Hosts the PVs listed in `server.toml` behind a static provider registered
//! in the process-wide provider registry, attaches a logging client to each
//! of them and posts a counter update every period.
//!
//! # Usage
//!
//! ```bash
//! # Default config path, run until Ctrl-C
//! pvas_server
//!
//! # Explicit config, ten updates, verbose logging
//! pvas_server --config config/server.toml --cycles 10 -v
//!
//! # JSON logs
//! pvas_server --json
//! ```

use clap::Parser;
use pvas_common::config::{ConfigError, ConfigLoader, LogLevel, PvConfig, ServerConfig};
use pvas_common::consts::DEFAULT_CONFIG_PATH;
use pvas_common::pvdata::{ChangeMask, PvStructure, ScalarType, ScalarValue, Status, Structure};
use pvas_server::{
    global_registry, ChannelProvider, ChannelProviderFactory, ChannelRequester, MonitorRequester,
    Requester, SharedMonitorFifo, SharedPv, SimpleProviderFactory, StaticProvider,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// PVAS demo server - shared PVs behind a static channel provider
#[derive(Parser, Debug)]
#[command(name = "pvas_server")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Shared-PV channel access demo server")]
#[command(long_about = None)]
struct Args {
    /// Path to server configuration file (server.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after this many updates (default: run until Ctrl-C)
    #[arg(long)]
    cycles: Option<u64>,

    /// Update period in milliseconds
    #[arg(long, default_value_t = 1000)]
    period_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

/// Client that logs every monitor update it receives.
struct LogClient;

impl Requester for LogClient {
    fn requester_name(&self) -> String {
        "log-client".to_string()
    }
}

impl ChannelRequester for LogClient {}

impl MonitorRequester for LogClient {
    fn monitor_connect(
        &self,
        status: Status,
        monitor: &Arc<SharedMonitorFifo>,
        structure: Arc<Structure>,
    ) {
        info!(
            channel = %monitor.channel().channel_name(),
            type_id = structure.id(),
            %status,
            "Monitor connected"
        );
    }

    fn monitor_event(&self, monitor: &Arc<SharedMonitorFifo>) {
        while let Some(element) = monitor.poll() {
            info!(
                channel = %monitor.channel().channel_name(),
                value = ?element.value.get("value"),
                overrun = element.overrun.count(),
                "Update"
            );
        }
    }

    fn unlisten(&self, monitor: &Arc<SharedMonitorFifo>) {
        info!(channel = %monitor.channel().channel_name(), "Monitor closed");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = ServerConfig::load(&args.config);

    // Logging is up before any config error is reported.
    let level = match &loaded {
        Ok(config) => config.shared.log_level,
        Err(_) => LogLevel::default(),
    };
    setup_tracing(&args, level);
    info!("PVAS server v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) => {
            warn!("No config at {:?}. Using defaults.", args.config);
            ServerConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    if config.pvs.is_empty() {
        config.pvs.push(PvConfig {
            name: "demo:counter".to_string(),
            initial: 0.0,
            read_only: false,
        });
    }
    config.validate()?;

    // Build and open the hosted PVs.
    let mut served = Vec::new();
    let mut hosted = Vec::new();
    for pv_config in &config.pvs {
        let pv = if pv_config.read_only {
            SharedPv::build_read_only(pv_config.name.clone())
        } else {
            SharedPv::build_mailbox(pv_config.name.clone())
        };
        pv.set_debug(config.debug_level);
        pv.set_monitor_queue_size(config.monitor_queue_size);
        pv.open_all(&scalar(pv_config.initial)?)?;
        served.push((pv_config.name.clone(), pv.clone()));
        hosted.push((pv, pv_config.initial));
    }

    // Register the provider. Fresh instances serve the same PVs.
    let provider = StaticProvider::from_pvs(config.provider_name.clone(), served.clone());
    let provider_name = config.provider_name.clone();
    let factory: Arc<dyn ChannelProviderFactory> = Arc::new(
        SimpleProviderFactory::new(config.provider_name.clone(), move || {
            StaticProvider::from_pvs(provider_name.clone(), served.clone())
                as Arc<dyn ChannelProvider>
        })
        .with_shared(provider),
    );
    global_registry().register_factory(factory.clone());
    info!(providers = ?global_registry().provider_names(), "Providers registered");

    // Attach the logging client through the registry.
    let resolved = global_registry()
        .get_provider(&config.provider_name)
        .ok_or("provider not registered")?;
    let client = Arc::new(LogClient);
    let channel_requester: Arc<dyn ChannelRequester> = client.clone();
    let monitor_requester: Arc<dyn MonitorRequester> = client;
    let mut monitors = Vec::new();
    for name in resolved.channel_names() {
        if let Some(channel) = resolved.create_channel(&name, &channel_requester) {
            let monitor = channel.create_monitor(&monitor_requester, PvStructure::empty());
            monitor.start();
            monitors.push(monitor);
        }
    }
    info!("{} monitors attached", monitors.len());

    // Setup signal handler.
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let mut changed = ChangeMask::new();
    changed.set(1);
    let period = Duration::from_millis(args.period_ms);
    let mut cycle: u64 = 0;
    while running.load(Ordering::SeqCst) && args.cycles.is_none_or(|n| cycle < n) {
        std::thread::sleep(period);
        cycle += 1;
        for (pv, initial) in &hosted {
            if let Err(e) = pv.post(&scalar(initial + cycle as f64)?, &changed) {
                warn!(pv = %pv.name(), "Post failed: {e}");
            }
        }
    }

    drop(monitors);
    global_registry().unregister_factory(&factory);
    info!("PVAS server shutdown complete after {} updates", cycle);
    Ok(())
}

/// Scalar double value.
fn scalar(value: f64) -> Result<PvStructure, Box<dyn std::error::Error>> {
    Ok(PvStructure::new(Structure::scalar(ScalarType::Double))
        .with("value", ScalarValue::Double(value))?)
}

/// Setup tracing subscriber based on CLI arguments and configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        configured.as_directive()
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
