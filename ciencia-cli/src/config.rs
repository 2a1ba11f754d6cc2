//! CLI configuration

use ciencia_client::CienciaClient;

#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
}

impl Config {
    /// Builds an API client for the configured orchestrator
    pub fn client(&self) -> CienciaClient {
        CienciaClient::new(&self.orchestrator_url)
    }
}
