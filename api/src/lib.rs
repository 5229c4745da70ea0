pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod tasks;

#[cfg(test)]
mod tests;

pub use config::{AppConfig, Cli, load_config};
pub use error::*;
pub use server::*;

use anyhow::Result;
use clap::Parser;
use std::panic;

/// Main server entry point for library usage
pub async fn run_server() -> Result<()> {
    let cli = Cli::parse();
    let app_config = load_config(&cli)?;

    observability::init_observability(&app_config)?;

    // Handler panics are caught by the instrumentation layer; this only
    // routes the panic message through the operational log.
    panic::set_hook(Box::new(|panic_info| {
        ::tracing::error!(panic = %panic_info, "Panic occurred");
    }));

    ::tracing::info!(
        service = %app_config.telemetry.service_name,
        environment = %app_config.telemetry.environment,
        "Portal API starting up"
    );

    server::start_server(app_config).await
}
