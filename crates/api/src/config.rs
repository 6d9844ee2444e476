//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use domain::LifecycleConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset keeps documents in memory
/// - `ENFORCE_PRESCRIPTION`: reject prescription-only orders without a prescription (default: `false`)
/// - `ASSIGN_DRIVER_RESETS_STATUS`: driver self-assignment moves the order back to `confirmed` (default: `false`)
/// - `ACCESS_TOKENS`: `token=actorType:uuid[:inactive]` entries, comma separated
/// - `SEED_PATH`: JSON file with medicines and pharmacies loaded at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub enforce_prescription: bool,
    pub assign_driver_resets_status: bool,
    pub access_tokens: Option<String>,
    pub seed_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            enforce_prescription: non_empty("ENFORCE_PRESCRIPTION")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.enforce_prescription),
            assign_driver_resets_status: non_empty("ASSIGN_DRIVER_RESETS_STATUS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.assign_driver_resets_status),
            access_tokens: non_empty("ACCESS_TOKENS"),
            seed_path: non_empty("SEED_PATH").map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Switches handed to the order lifecycle engine.
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig::default()
            .with_prescription_enforcement(self.enforce_prescription)
            .with_assign_driver_reset(self.assign_driver_resets_status)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            enforce_prescription: false,
            assign_driver_resets_status: false,
            access_tokens: None,
            seed_path: None,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
