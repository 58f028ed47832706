mod config;
mod driver;
mod error;
mod kernel;
mod network;
mod routes;
mod rules;
mod sync;

use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use config::{Config, ConfigSource};
use driver::Driver;
use kernel::{DryRun, IpCommand, KernelTables};

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Could not load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging, RUST_LOG directives take precedence over the configured level
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("policy-route-sync starting...");
    match &config.source {
        ConfigSource::File(path) => tracing::info!("Loaded configuration from: {}", path.display()),
        ConfigSource::CommandLine => {
            tracing::info!("Using single table definition from the command line")
        }
    }
    for table in &config.tables {
        tracing::info!(
            "Table '{}': next-hop {} -> table {} (priority {})",
            table.name,
            table.search_next_hop,
            table.target_table,
            table.rule_priority
        );
    }

    let ip = IpCommand::new(config.ip_command.clone());
    let kernel: Arc<dyn KernelTables> = if config.dry_run {
        tracing::warn!("Dry run: rule changes are logged, not applied");
        Arc::new(DryRun::new(ip))
    } else {
        Arc::new(ip)
    };

    let driver = Driver::new(kernel, config.tables, config.sleep_time);

    if let Err(e) = driver.run(config.once).await {
        tracing::error!("Reconciliation loop stopped: {:#}", e);
        std::process::exit(1);
    }
}
