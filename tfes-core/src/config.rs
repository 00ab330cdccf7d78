//! Broker configuration: the on-disk JSON shape for the client listener,
//! the cluster listener, and the static peer route list.
//!
//! Loading failures (missing file, malformed JSON, structurally invalid
//! shape) are fatal — there is no sensible default to fall back to, so the
//! process should not start.

use crate::error::TfesError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The client-facing listener's identity and bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub address: String,
    pub port: u16,
}

/// A configured sibling broker to dial at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    pub url: String,
}

/// The cluster (peer-plane) listener and its static route list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Top-level broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cluster: ClusterConfig,
}

impl Config {
    /// Loads and parses the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TfesError::Config`] if the file cannot be read or does not
    /// parse as the expected JSON shape.
    pub fn load(path: &Path) -> Result<Self, TfesError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TfesError::config(format!("reading {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| TfesError::config(format!("parsing {}: {e}", path.display())))
    }

    /// The client-plane bind address, `host:port`.
    #[must_use]
    pub fn client_addr(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }

    /// The cluster (peer-plane) bind address, `host:port`.
    #[must_use]
    pub fn cluster_addr(&self) -> String {
        format!("{}:{}", self.cluster.address, self.cluster.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_shape() {
        let json = r#"{
            "server": {"name": "a", "address": "0.0.0.0", "port": 5555},
            "cluster": {"address": "0.0.0.0", "port": 6666, "routes": [
                {"name": "b", "url": "127.0.0.1:6667"}
            ]}
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.client_addr(), "0.0.0.0:5555");
        assert_eq!(cfg.cluster_addr(), "0.0.0.0:6666");
        assert_eq!(cfg.cluster.routes.len(), 1);
        assert_eq!(cfg.cluster.routes[0].url, "127.0.0.1:6667");
    }

    #[test]
    fn routes_default_to_empty_when_absent() {
        let json = r#"{
            "server": {"name": "a", "address": "0.0.0.0", "port": 5555},
            "cluster": {"address": "0.0.0.0", "port": 6666}
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert!(cfg.cluster.routes.is_empty());
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let err = Config::load(Path::new("/nonexistent/tfes-config.json")).unwrap_err();
        assert!(matches!(err, TfesError::Config(_)));
    }
}
