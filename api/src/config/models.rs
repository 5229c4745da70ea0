use garde::Validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
pub struct AppConfig {
    #[garde(dive)]
    #[serde(default)]
    pub server: ServerConfig,

    #[garde(dive)]
    #[serde(default)]
    pub logging: LoggingConfig,

    #[garde(dive)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[garde(dive)]
    #[serde(default)]
    pub app: AppInfoConfig,

    #[garde(dive)]
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ServerConfig {
    #[garde(range(min = 1024, max = 65535))]
    #[serde(default = "default_port")]
    pub port: u16,

    #[garde(length(min = 1), custom(validate_bind_address))]
    #[serde(default = "default_bind")]
    pub bind: String,

    #[garde(range(min = 1, max = 300))]
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64, // seconds
}

fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoggingConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_log_level")]
    pub level: String, // trace, debug, info, warn, error

    #[garde(pattern(r"^(json|pretty)$"))]
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Upstream APM / OpenTelemetry settings.
#[derive(Clone, Deserialize, Serialize, Validate)]
pub struct TelemetryConfig {
    /// Name this service reports to the APM server and stamps on every event
    #[garde(length(min = 1))]
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP endpoint of the APM server
    #[garde(custom(validate_endpoint_url))]
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Deployment environment tag (`env` field on every event)
    #[garde(length(min = 1))]
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Sent as a bearer token to the APM server when set
    #[garde(skip)]
    #[serde(default)]
    pub secret_token: Option<String>,

    #[garde(skip)]
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// Sample rate (0.0-1.0). 1.0 = sample all traces
    #[garde(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    #[garde(range(min = 1, max = 300))]
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,
}

fn default_service_name() -> String {
    "portal-api".to_string()
}

fn default_server_url() -> String {
    "http://localhost:8200".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_telemetry_enabled() -> bool {
    true
}

fn default_sample_rate() -> f64 {
    1.0
}

fn default_export_timeout() -> u64 {
    10
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            server_url: default_server_url(),
            environment: default_environment(),
            secret_token: None,
            enabled: default_telemetry_enabled(),
            sample_rate: default_sample_rate(),
            export_timeout_secs: default_export_timeout(),
        }
    }
}

// Keeps the secret token out of startup logs and panic messages.
impl std::fmt::Debug for TelemetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryConfig")
            .field("service_name", &self.service_name)
            .field("server_url", &self.server_url)
            .field("environment", &self.environment)
            .field("secret_token", &self.secret_token.as_ref().map(|_| "<REDACTED>"))
            .field("enabled", &self.enabled)
            .field("sample_rate", &self.sample_rate)
            .field("export_timeout_secs", &self.export_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AppInfoConfig {
    /// `app` tag on every event
    #[garde(length(min = 1))]
    #[serde(default = "default_app_name")]
    pub name: String,

    /// `logger_name` field on every event
    #[garde(length(min = 1))]
    #[serde(default = "default_app_name")]
    pub logger_name: String,
}

fn default_app_name() -> String {
    "portal-api".to_string()
}

impl Default for AppInfoConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            logger_name: default_app_name(),
        }
    }
}

/// Artificial latencies of the mock endpoints, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SimulationConfig {
    #[garde(range(max = 60000))]
    #[serde(default = "default_login_delay")]
    pub login_delay_ms: u64,

    #[garde(range(max = 60000))]
    #[serde(default = "default_dashboard_delay")]
    pub dashboard_delay_ms: u64,

    #[garde(range(max = 60000))]
    #[serde(default = "default_dashboard_jitter")]
    pub dashboard_jitter_ms: u64,

    #[garde(range(max = 60000))]
    #[serde(default = "default_ticket_delay")]
    pub ticket_delay_ms: u64,

    #[garde(range(max = 60000))]
    #[serde(default = "default_search_delay")]
    pub search_delay_ms: u64,

    /// Delay before the detached officer assignment runs
    #[garde(range(max = 600000))]
    #[serde(default = "default_assignment_delay")]
    pub assignment_delay_ms: u64,
}

fn default_login_delay() -> u64 {
    350
}

fn default_dashboard_delay() -> u64 {
    500
}

fn default_dashboard_jitter() -> u64 {
    300
}

fn default_ticket_delay() -> u64 {
    800
}

fn default_search_delay() -> u64 {
    300
}

fn default_assignment_delay() -> u64 {
    2000
}

impl SimulationConfig {
    /// No artificial latency anywhere; used by tests.
    pub fn instant() -> Self {
        Self {
            login_delay_ms: 0,
            dashboard_delay_ms: 0,
            dashboard_jitter_ms: 0,
            ticket_delay_ms: 0,
            search_delay_ms: 0,
            assignment_delay_ms: 0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            login_delay_ms: default_login_delay(),
            dashboard_delay_ms: default_dashboard_delay(),
            dashboard_jitter_ms: default_dashboard_jitter(),
            ticket_delay_ms: default_ticket_delay(),
            search_delay_ms: default_search_delay(),
            assignment_delay_ms: default_assignment_delay(),
        }
    }
}

fn validate_bind_address(value: &str, _: &()) -> garde::Result {
    value
        .parse::<std::net::IpAddr>()
        .map(|_| ())
        .map_err(|_| garde::Error::new("Invalid IP address"))
}

fn validate_endpoint_url(value: &str, _: &()) -> garde::Result {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(garde::Error::new("Endpoint URL must start with http:// or https://"))
    }
}
