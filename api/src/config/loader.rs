use anyhow::Result;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use garde::Validate;

use super::AppConfig;

#[derive(Parser, Clone, Debug, Default)]
#[command(
    name = "portal-api",
    about = "Portal API with request correlation and business-event logging"
)]
pub struct Cli {
    /// Path to an additional configuration file
    #[arg(long, env = "APP_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Environment name (selects config/<environment>.toml and the `env` tag)
    #[arg(long)]
    pub environment: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Load configuration with the layered hierarchy:
///
/// 1. embedded defaults
/// 2. `config/default.toml`, then `config/<environment>.toml`
/// 3. well-known deployment variables (`PORT`, `ELASTIC_APM_*`, `NODE_ENV`, ...)
/// 4. `APP_`-prefixed variables, `__` separating sections
/// 5. CLI arguments
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let config: AppConfig = figment(cli).extract()?;

    config.validate()?;

    Ok(config)
}

/// Build the provider stack without extracting it.
pub fn figment(cli: &Cli) -> Figment {
    let environment = cli
        .environment
        .clone()
        .or_else(|| std::env::var("NODE_ENV").ok())
        .unwrap_or_else(|| "dev".to_string());

    let mut figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file("config/default.toml"))
        .merge(Toml::file(format!("config/{}.toml", environment)))
        .merge(well_known_env())
        .merge(Env::prefixed("APP_").split("__"));

    if let Some(path) = &cli.config {
        figment = figment.merge(Toml::file(path));
    }
    if let Some(port) = cli.port {
        figment = figment.merge(Serialized::default("server.port", port));
    }
    if let Some(environment) = &cli.environment {
        figment = figment.merge(Serialized::default("telemetry.environment", environment));
    }
    if cli.debug {
        figment = figment.merge(Serialized::default("logging.level", "debug"));
    }

    figment
}

/// Unprefixed variables the deployment tooling already sets.
fn well_known_env() -> Env {
    Env::raw().filter_map(|key| {
        let mapped = match key.as_str().to_ascii_uppercase().as_str() {
            "PORT" => "server.port",
            "LOG_LEVEL" => "logging.level",
            "SERVICE_NAME" | "ELASTIC_APM_SERVICE_NAME" => "telemetry.service_name",
            "ELASTIC_APM_SERVER_URL" => "telemetry.server_url",
            "ELASTIC_APM_SECRET_TOKEN" => "telemetry.secret_token",
            "NODE_ENV" => "telemetry.environment",
            "APP_NAME" => "app.name",
            _ => return None,
        };
        Some(mapped.into())
    })
}
