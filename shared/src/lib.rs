pub mod fleet;

use crate::error::{ConfigError, InitializationError};
use crate::fleet::VehicleType;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const ENV_VAR_PREFIX: &str = "FLEET__";
pub const SETTINGS_FILE: &str = "Settings.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub postgres: Option<PostgresConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub positions: PositionsConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertsConfig {
    /// Shifts open strictly longer than this many hours are reported.
    pub threshold_hours: f64,
    pub scan_interval_seconds: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            threshold_hours: 12.0,
            scan_interval_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PositionsConfig {
    pub refresh_interval_seconds: u64,
    /// Unset keeps every worker that has ever reported in the live set.
    pub max_age_seconds: Option<u64>,
    /// Refuse position reports from workers without an open shift.
    pub require_open_shift: bool,
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: 5,
            max_age_seconds: None,
            require_open_shift: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ReportingConfig {
    /// Offset used to decide which calendar day a shift starts on.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WorkersConfig {
    pub default_vehicle: VehicleType,
}

pub fn load_config() -> Result<Config, ConfigError> {
    extract_config(
        Figment::new()
            .merge(Toml::file(SETTINGS_FILE))
            .merge(Env::prefixed(ENV_VAR_PREFIX).split("__")),
    )
}

fn extract_config(figment: Figment) -> Result<Config, ConfigError> {
    Ok(figment.extract::<Config>()?)
}

pub mod error {
    use thiserror::Error;
    use tracing::dispatcher::SetGlobalDefaultError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to load configuration: {0}")]
        Figment(#[from] figment::Error),
        #[error("invalid configuration value for {key}: {reason}")]
        Invalid { key: &'static str, reason: String },
    }

    #[derive(Debug, Error)]
    pub enum InitializationError {
        #[error(transparent)]
        Tracing(#[from] SetGlobalDefaultError),
        #[error(transparent)]
        Config(#[from] ConfigError),
    }
}

pub fn init_tracing() -> Result<(), InitializationError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

pub async fn shutdown_listener(token: Option<CancellationToken>) {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C signal, shutting down"),
        _ = terminate => info!("received SIGTERM signal, shutting down"),
    }

    if let Some(token) = token {
        token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_fall_back_to_defaults() {
        let config = extract_config(Figment::new()).unwrap();
        assert!(config.postgres.is_none());
        assert_eq!(config.alerts.threshold_hours, 12.0);
        assert_eq!(config.alerts.scan_interval_seconds, 30);
        assert_eq!(config.positions.refresh_interval_seconds, 5);
        assert_eq!(config.positions.max_age_seconds, None);
        assert!(config.positions.require_open_shift);
        assert_eq!(config.workers.default_vehicle, VehicleType::Car);
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let toml = r#"
            [postgres]
            connection_string = "postgres://fleet@localhost/fleet"

            [alerts]
            threshold_hours = 10.5

            [positions]
            max_age_seconds = 600

            [workers]
            default_vehicle = "scooter"
        "#;
        let config = extract_config(Figment::from(Toml::string(toml))).unwrap();
        assert_eq!(
            config.postgres.unwrap().connection_string,
            "postgres://fleet@localhost/fleet"
        );
        assert_eq!(config.alerts.threshold_hours, 10.5);
        assert_eq!(config.alerts.scan_interval_seconds, 30);
        assert_eq!(config.positions.max_age_seconds, Some(600));
        assert_eq!(config.workers.default_vehicle, VehicleType::Scooter);
    }

    #[test]
    fn unknown_vehicle_category_is_rejected() {
        let toml = r#"
            [workers]
            default_vehicle = "truck"
        "#;
        assert!(extract_config(Figment::from(Toml::string(toml))).is_err());
    }
}
