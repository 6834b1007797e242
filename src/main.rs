use std::path::Path;

use clap::Parser;
use config::{Cli, ConnectionConfig};
use error::{AppError, AppResult};
use models::PerfCounterInfo;
use session::Session;
use soap::VimClient;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
mod config;
mod counters;
mod error;
mod models;
mod output;
mod session;
mod soap;
#[cfg(test)]
mod testing;

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vsphere_perf_counters=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Connect, read the counter definitions, log out.
async fn fetch(config: &ConnectionConfig) -> AppResult<Vec<PerfCounterInfo>> {
    let client = VimClient::connect(config).await?;

    if client.is_vcenter() {
        println!("connected to vCenter");
    } else {
        println!("connected to ESXi host");
    }

    let counters = counters::fetch_counters(&client).await;

    if let Err(err) = client.logout().await {
        warn!(%err, "logout failed");
    }

    counters
}

/// Write every counter definition of the endpoint to `output`. Returns the number of rows.
async fn dump(config: &ConnectionConfig, output: &Path) -> AppResult<usize> {
    let counters = tokio::select! {
        counters = fetch(config) => counters?,
        _ = tokio::signal::ctrl_c() => return Err(AppError::Cancelled),
    };

    let rows = counters::project_rows(&counters);
    output::write_rows(output, &rows)?;

    Ok(rows.len())
}

async fn run(cli: &Cli) -> AppResult<()> {
    let config = ConnectionConfig::resolve(cli, |name| std::env::var(name).ok())?;

    println!("u: {}", config.display_url());

    let rows = dump(&config, &cli.output).await?;

    info!(rows, path = %cli.output.display(), "wrote performance counters");

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse_from(config::long_flag_args(std::env::args_os()));

    if let Err(err) = run(&cli).await {
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
}
