//! # Portvakt Configuration
//!
//! Loaded once at startup and treated as immutable for the life of the
//! process.
//!
//! Hierarchy (later wins):
//! 1. Built-in defaults
//! 2. `config/portvakt.yaml`
//! 3. `config/<PORTVAKT_ENV>.yaml`
//! 4. `PORTVAKT_*` environment variables (`__` separates sections, e.g.
//!    `PORTVAKT_DETECTION__SYN_THRESHOLD=20`)

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

mod capture;
mod detection;
mod error;
mod server;
mod storage;
mod telemetry;
mod validation;

pub use capture::CaptureConfig;
pub use detection::DetectionConfig;
pub use error::ConfigError;
pub use server::ServerConfig;
pub use storage::StorageConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/portvakt.yaml";
const ENV_PREFIX: &str = "PORTVAKT_";

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct PortvaktConfig {
    #[validate(nested)]
    #[serde(default)]
    pub capture: CaptureConfig,

    #[validate(nested)]
    #[serde(default)]
    pub detection: DetectionConfig,

    #[validate(nested)]
    #[serde(default)]
    pub storage: StorageConfig,

    #[validate(nested)]
    #[serde(default)]
    pub server: ServerConfig,

    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl PortvaktConfig {
    /// Load configuration from the default files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(PortvaktConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("PORTVAKT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{env}.yaml");
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from an explicit file (defaults and environment
    /// still apply).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment = Figment::from(Serialized::defaults(PortvaktConfig::default()))
            .merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["env"]).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Logs the effective settings once at startup.
    pub fn log_summary(&self) {
        match &self.capture.savefile {
            Some(file) => info!(savefile = %file.display(), "capture source: replay"),
            None => info!(interface = %self.capture.interface, "capture source: live"),
        }
        info!(
            filter = %self.capture.filter,
            threshold = self.detection.syn_threshold,
            window_secs = self.detection.window_secs,
            allowlisted = self.detection.allowlist.len(),
            "detection settings"
        );
        info!(database = %self.storage.path.display(), "alert storage");
        info!(bind = %self.server.bind, path = %self.server.path, "subscriber endpoint");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn full_config_validation() {
        let config = PortvaktConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn defaults_match_the_classic_deployment() {
        let config = PortvaktConfig::default();
        assert_eq!(config.capture.filter, "tcp");
        assert_eq!(config.detection.syn_threshold, 8);
        assert_eq!(config.detection.window_secs, 10);
        assert_eq!(config.server.path, "/ws/alerts");
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("PORTVAKT_DETECTION__SYN_THRESHOLD", "3");
            jail.set_env("PORTVAKT_CAPTURE__INTERFACE", "wlan0");
            let config = PortvaktConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.detection.syn_threshold, 3);
            assert_eq!(config.capture.interface, "wlan0");
            Ok(())
        });
    }

    #[test]
    fn file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "portvakt.yaml",
                r#"
capture:
  interface: en0
  filter: "tcp and not port 22"
  snaplen: 128KiB
detection:
  window_secs: 30
  allowlist: ["10.1.0.0/16"]
"#,
            )?;
            jail.set_env("PORTVAKT_DETECTION__WINDOW_SECS", "5");

            let config = PortvaktConfig::load_from_path("portvakt.yaml").map_err(|e| e.to_string())?;
            assert_eq!(config.capture.interface, "en0");
            assert_eq!(config.capture.filter, "tcp and not port 22");
            assert_eq!(config.capture.snaplen, 131072);
            assert_eq!(config.detection.window_secs, 5);
            assert_eq!(config.detection.syn_threshold, 8);
            assert_eq!(config.detection.allowlist.len(), 1);
            Ok(())
        });
    }

    #[test]
    fn validation_errors_name_the_field() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "detection:\n  syn_threshold: 0\n")?;
            let err = PortvaktConfig::load_from_path("bad.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(err.to_string().contains("detection.syn_threshold"));
            Ok(())
        });
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            PortvaktConfig::load_from_path("/nonexistent/portvakt.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
