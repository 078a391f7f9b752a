//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, storage, analysis,
/// performance) makes it easier to understand and maintain as the application grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upload artifact storage settings.
///
/// ## Fields:
/// - `upload_dir`: Directory where uploaded audio is written before analysis.
///   Each upload gets a unique file name and is deleted once its pipeline run ends.
/// - `max_upload_bytes`: Hard cap on a single audio upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

/// Analysis pipeline tuning.
///
/// ## Fields:
/// - `collaborator_timeout_secs`: Deadline for one external collaborator call
///   (audio probe, transcription, emotion inference, each text analyzer).
///   A hung collaborator fails its step instead of stalling the session.
/// - `trend_epsilon`: Minimum absolute slope magnitude before a risk trajectory
///   is reported as escalating/decreasing rather than stable.
/// - `max_concurrent_runs`: Maximum pipeline runs in flight at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub collaborator_timeout_secs: u64,
    pub trend_epsilon: f64,
    pub max_concurrent_runs: usize,
}

/// Performance tuning configuration.
///
/// ## Tuning guidelines:
/// - Higher `max_connections`: More simultaneously connected event channels,
///   but each holds an open WebSocket and an unbounded send queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_connections: usize,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file exists.
/// They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                upload_dir: std::env::temp_dir()
                    .join("convo-insight-uploads")
                    .to_string_lossy()
                    .to_string(),
                max_upload_bytes: 25 * 1024 * 1024, // 25MB of audio per upload
            },
            analysis: AnalysisConfig {
                collaborator_timeout_secs: 60,
                trend_epsilon: 0.2,
                max_concurrent_runs: 10,
            },
            performance: PerformanceConfig {
                max_connections: 100,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: Override server host
    /// - `APP_ANALYSIS_TREND_EPSILON=0.5`: Override the trend threshold
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject HOST/PORT without the APP_ prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0 (port 0 is reserved and can't be used)
    /// - Upload cap, concurrent run limit and collaborator deadline are non-zero
    /// - The trend epsilon is non-negative (a negative threshold would report
    ///   every flat trajectory as escalating)
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.analysis.collaborator_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "Collaborator timeout must be greater than 0"
            ));
        }

        if self.analysis.max_concurrent_runs == 0 {
            return Err(anyhow::anyhow!(
                "Max concurrent runs must be greater than 0"
            ));
        }

        if self.analysis.trend_epsilon < 0.0 {
            return Err(anyhow::anyhow!("Trend epsilon cannot be negative"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// This method allows updating only some fields, not the entire configuration.
    /// For example, you can send just `{"server": {"port": 9000}}` to change only the port.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(storage) = partial_config.get("storage") {
            if let Some(dir) = storage.get("upload_dir").and_then(|v| v.as_str()) {
                self.storage.upload_dir = dir.to_string();
            }
            if let Some(cap) = storage.get("max_upload_bytes").and_then(|v| v.as_u64()) {
                self.storage.max_upload_bytes = cap as usize;
            }
        }

        if let Some(analysis) = partial_config.get("analysis") {
            if let Some(timeout) = analysis
                .get("collaborator_timeout_secs")
                .and_then(|v| v.as_u64())
            {
                self.analysis.collaborator_timeout_secs = timeout;
            }
            if let Some(epsilon) = analysis.get("trend_epsilon").and_then(|v| v.as_f64()) {
                self.analysis.trend_epsilon = epsilon;
            }
            if let Some(runs) = analysis.get("max_concurrent_runs").and_then(|v| v.as_u64()) {
                self.analysis.max_concurrent_runs = runs as usize;
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(conns) = performance.get("max_connections").and_then(|v| v.as_u64()) {
                self.performance.max_connections = conns as usize;
            }
        }

        // Validate the updated configuration to ensure it's still valid
        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analysis.trend_epsilon = -1.0;
        assert!(config.validate().is_err());
    }

    /// Test that runtime configuration updates work correctly.
    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"server": {"port": 9090}, "analysis": {"trend_epsilon": 0.5}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.analysis.trend_epsilon, 0.5);
        // Other fields should remain unchanged
        assert_eq!(config.server.host, "127.0.0.1");
    }

    /// Invalid partial updates must be rejected.
    #[test]
    fn test_config_update_rejects_invalid() {
        let mut config = AppConfig::default();
        let json = r#"{"analysis": {"max_concurrent_runs": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
