//! Server configuration
//!
//! Everything the orchestrator binary needs at startup: where to listen,
//! where to persist, and how to invoke the workflow engine.

use ciencia_runner::EngineConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Postgres connection string; `None` keeps all state in memory
    pub database_url: Option<String>,

    /// Workflow engine and workspace settings
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Creates configuration from environment variables
    ///
    /// - ORCHESTRATOR_BIND_ADDR (optional, default: 0.0.0.0:8000)
    /// - DATABASE_URL (optional, in-memory storage when unset)
    /// - CIENCIA_* engine variables, see [`EngineConfig::from_env`]
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("ORCHESTRATOR_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Self {
            bind_addr,
            database_url,
            engine: EngineConfig::from_env()?,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.trim().is_empty() {
            anyhow::bail!("bind address cannot be empty");
        }

        self.engine.validate()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            engine: EngineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert!(config.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_covers_engine() {
        let mut config = ServerConfig::default();
        config.engine.runs_dir = Default::default();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.bind_addr = " ".to_string();
        assert!(config.validate().is_err());
    }
}
