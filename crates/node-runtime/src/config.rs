//! # Node Configuration
//!
//! TOML file with per-section defaults, overridable from the environment.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 32767
//!
//! [peers]
//! sync = false
//! retry = 5
//! bootstrap = ["ws://seed.example.org:32767"]
//!
//! [message]
//! division = true
//! max_size = 1   # MB per response:blocks message
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Key |
//! |----------|-----|
//! | `QC_SERVER_HOST` | `server.host` |
//! | `QC_SERVER_PORT` | `server.port` |
//! | `QC_DATA_DIR` | `data.dir` |
//! | `QC_PEERS_SYNC` | `peers.sync` |
//! | `QC_LOG_LEVEL` | `log.level` |

use qc_02_gossip::{platform_info, GossipConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub peers: PeersConfig,
    pub data: DataConfig,
    pub message: MessageConfig,
    pub hooks: HooksConfig,
    pub broadcast: BroadcastConfig,
    pub log: LogConfig,
}

/// Listening socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 32767,
        }
    }
}

/// Peer discovery and dialing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeersConfig {
    /// Request peer lists from peers that advertise some.
    pub sync: bool,
    /// Dial attempts per bootstrap peer.
    pub retry: u32,
    /// Websocket URLs dialed at startup.
    pub bootstrap: Vec<String>,
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            sync: false,
            retry: 5,
            bootstrap: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root of the file storage.
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
        }
    }
}

/// Block batch sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    /// Split `response:blocks` into several messages.
    pub division: bool,
    /// Soft cap per message in MB; only used with `division`.
    pub max_size: u64,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            division: true,
            max_size: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// URL that receives a POST for every accepted block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
}

/// Broadcast de-duplication memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub memo_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            memo_ttl_secs: 3600,
            sweep_interval_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `info` or `qc_02_gossip=debug`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

impl NodeConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write this configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(path, self.to_toml()?).map_err(io)
    }

    /// Apply `QC_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("QC_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("QC_SERVER_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "QC_SERVER_PORT",
                value: port,
            })?;
        }
        if let Some(dir) = lookup("QC_DATA_DIR") {
            self.data.dir = PathBuf::from(dir);
        }
        if let Some(sync) = lookup("QC_PEERS_SYNC") {
            self.peers.sync = parse_bool(&sync).ok_or(ConfigError::InvalidValue {
                key: "QC_PEERS_SYNC",
                value: sync,
            })?;
        }
        if let Some(level) = lookup("QC_LOG_LEVEL") {
            self.log.level = level;
        }
        Ok(())
    }

    /// `host:port` to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Byte cap per `response:blocks` message.
    pub fn max_message_bytes(&self) -> usize {
        usize::try_from(self.message.max_size.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    pub fn memo_ttl(&self) -> Duration {
        Duration::from_secs(self.broadcast.memo_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.broadcast.sweep_interval_secs.max(1))
    }

    pub fn gossip_config(&self) -> GossipConfig {
        GossipConfig {
            peer_sync: self.peers.sync,
            division: self.message.division,
            max_message_size: self.max_message_bytes(),
            platform: platform_info(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
