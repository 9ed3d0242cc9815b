use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use lucky_money::{
    client,
    config::{
        AppConfig,
        Cli,
        Command,
    },
    deployment::{
        DeploymentRecord,
        DeploymentStore,
    },
    wallets,
};
use std::{
    fs,
    path::Path,
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// The TUI owns stdout, so logs go to a daily file under `log_dir`.
fn init_tracing(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, "lucky-money.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))
}

fn record_deployment(config: &AppConfig, address: alloy::primitives::Address) -> Result<()> {
    let store = DeploymentStore::new(&config.deployments_dir, config.network);
    let record = DeploymentRecord::new(
        address,
        config.rpc_url(config.network).as_str(),
        Some(config.subgraph_url.as_str()),
    );
    store.save(&record)?;
    println!(
        "Recorded {address} for {} in {}",
        config.network,
        store.path().display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let command = cli.command.clone();
    let config = AppConfig::from_cli(cli)?;
    init_tracing(&config.log_dir)?;
    tracing::info!(network = %config.network, "starting lucky-money client");

    if let Some(Command::RecordDeployment { address }) = command {
        return record_deployment(&config, address);
    }

    let signer = wallets::load_signer(&config.wallet)?;
    client::run_app(config, signer).await
}
