//! parley — single-shot conversational relay driver.
//!
//! One invocation runs one relay cycle and exits. Configuration comes from
//! `PARLEY_*` environment variables (a `.env` file is honored); scheduling
//! repeated invocations is the caller's job.
//!
//! The messaging transport is a capability seam: embedders link their own
//! [`parley_transport::ChatTransport`] implementation and call into
//! `parley_relay::cycle` directly. The shipped binary drives the scripted
//! transport from a rehearsal script, which exercises every part of the
//! cycle without a live network.

use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    clap::Parser,
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    parley_config::RelayConfig,
    parley_relay::{
        Forwarder, cycle,
        store::CounterStore,
        store_file::FileCounterStore,
        store_memory::InMemoryCounterStore,
        telemetry::{CycleStatus, FALLBACK_INTERVAL_MINUTES},
    },
    parley_transport::scripted::{Script, ScriptedTransport},
};

#[derive(Parser)]
#[command(name = "parley", about = "parley — conversational relay driver")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Rehearsal script (JSON) for the scripted transport.
    #[arg(long, env = "PARLEY_SCRIPT")]
    script: Option<PathBuf>,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_transport(path: &Path) -> anyhow::Result<ScriptedTransport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read transport script {}", path.display()))?;
    let script: Script = serde_json::from_str(&raw)
        .with_context(|| format!("invalid transport script {}", path.display()))?;
    Ok(ScriptedTransport::new(script))
}

fn open_store(config: &RelayConfig) -> Box<dyn CounterStore> {
    let file_store = match &config.state_dir {
        Some(dir) => Ok(FileCounterStore::in_dir(dir.clone())),
        None => FileCounterStore::default_path(),
    };
    match file_store {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "no usable state directory, failure counter will not persist");
            Box::new(InMemoryCounterStore::new())
        },
    }
}

/// Last-resort FAIL heartbeat for failures before a config exists. The
/// endpoint is read straight from the environment because that is all we
/// have at this point.
async fn emit_bootstrap_failure() {
    let telemetry_url = std::env::var("PARLEY_TELEMETRY_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());
    Forwarder::new(telemetry_url, None)
        .heartbeat(FALLBACK_INTERVAL_MINUTES, CycleStatus::Fail)
        .await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = match parley_config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration invalid");
            emit_bootstrap_failure().await;
            return Ok(());
        },
    };

    let Some(script_path) = cli.script.as_deref() else {
        error!("no transport script configured (--script or PARLEY_SCRIPT)");
        emit_bootstrap_failure().await;
        return Ok(());
    };
    let transport = match load_transport(script_path) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "transport unavailable");
            emit_bootstrap_failure().await;
            return Ok(());
        },
    };

    let store = open_store(&config);
    let forwarder = Forwarder::new(config.telemetry_url.clone(), config.relay_url.clone());

    let report = cycle::run(&config, &transport, store.as_ref(), &forwarder).await;
    info!(
        outcome = report.outcome.label(),
        minutes = report.minutes,
        forwarded = report.forwarded,
        "cycle finished"
    );
    Ok(())
}
