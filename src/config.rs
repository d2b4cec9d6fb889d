// This file is part of gatehouse.
//
// gatehouse is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// gatehouse is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Server configuration, layered CLI > environment > RON file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_ADDRESS;

const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_TICKET_TTL_SECS: u64 = 20;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: Duration,
    #[serde(default = "default_ticket_ttl")]
    pub ticket_ttl: Duration,
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: default_address(),
            connection_timeout: default_connection_timeout(),
            ticket_ttl: default_ticket_ttl(),
            fixture_path: None,
        }
    }
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS)
}

fn default_ticket_ttl() -> Duration {
    Duration::from_secs(DEFAULT_TICKET_TTL_SECS)
}

/// Overrides gathered from the CLI, applied last (highest precedence).
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub address: Option<String>,
    pub fixture_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Loads the file layer (if `path` exists), then applies environment
    /// variables, then `overrides`. A missing file is not an error: the
    /// built-in default takes its place.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                ron::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            _ => ServerConfig::default(),
        };

        if let Ok(address) = std::env::var("GATEHOUSE_ADDRESS") {
            config.address = address;
        }
        if let Ok(fixture_path) = std::env::var("GATEHOUSE_FIXTURE_PATH") {
            config.fixture_path = Some(PathBuf::from(fixture_path));
        }
        if let Ok(seconds) = std::env::var("GATEHOUSE_TICKET_TTL_SECS") {
            config.ticket_ttl = Duration::from_secs(
                seconds
                    .parse()
                    .context("GATEHOUSE_TICKET_TTL_SECS is not an integer")?,
            );
        }

        if let Some(address) = overrides.address {
            config.address = address;
        }
        if let Some(fixture_path) = overrides.fixture_path {
            config.fixture_path = Some(fixture_path);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.ticket_ttl, Duration::from_secs(20));
        assert_eq!(config.connection_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = ServerConfig::load(Some(Path::new("/nonexistent/gatehouse.ron")), ConfigOverrides::default())
            .unwrap();
        assert_eq!(config.address, DEFAULT_ADDRESS);
    }

    #[test]
    fn cli_override_wins_over_default() {
        let overrides = ConfigOverrides {
            address: Some("127.0.0.1:9999".to_string()),
            fixture_path: None,
        };
        let config = ServerConfig::load(None, overrides).unwrap();
        assert_eq!(config.address, "127.0.0.1:9999");
    }
}
