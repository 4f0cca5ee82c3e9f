// TOML config parsing and validation for amass-mcp.toml.
//
// Resolution order: $AMASS_MCP_CONFIG, then ./amass-mcp.toml, then defaults.
// $PORT overrides server.port in every case.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "AMASS_MCP_CONFIG";
pub const PORT_ENV: &str = "PORT";
const DEFAULT_CONFIG_PATH: &str = "amass-mcp.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub amass: AmassConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmassConfig {
    /// Executable name or path; bare names resolve through $PATH.
    pub binary: String,
    pub timeout_secs: u64,
    /// Upper bound on amass children running at once.
    pub max_concurrent: usize,
}

impl Default for AmassConfig {
    fn default() -> Self {
        Self {
            binary: "amass".to_string(),
            timeout_secs: 300,
            max_concurrent: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// JSON-lines audit file. Auditing is off when unset.
    pub path: Option<String>,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.amass.binary.trim().is_empty() {
            anyhow::bail!("amass.binary must not be empty");
        }
        if self.amass.timeout_secs == 0 {
            anyhow::bail!("amass.timeout_secs must be greater than 0");
        }
        if self.amass.max_concurrent == 0 {
            anyhow::bail!("amass.max_concurrent must be greater than 0");
        }
        Ok(())
    }

    fn apply_port_override(&mut self, port: Option<&str>) -> anyhow::Result<()> {
        if let Some(raw) = port {
            self.server.port = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {:?}", PORT_ENV, raw))?;
        }
        Ok(())
    }
}

/// Load the process config from the environment and working directory.
/// Returns the config and the file it came from, if any.
pub fn load_config() -> anyhow::Result<(Config, Option<PathBuf>)> {
    let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let port = std::env::var(PORT_ENV).ok();
    load_config_from(explicit.as_deref(), Path::new(DEFAULT_CONFIG_PATH), port.as_deref())
}

fn load_config_from(
    explicit: Option<&Path>,
    fallback: &Path,
    port: Option<&str>,
) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let source = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None if fallback.exists() => Some(fallback.to_path_buf()),
        None => None,
    };

    let mut config = match &source {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Config::from_toml(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => Config::default(),
    };

    config.apply_port_override(port)?;
    config.validate()?;
    Ok((config, source))
}
