//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use accrue_ledger::LedgerConfig;
use accrue_types::{Name, Symbol, MAX_VOTE_PRODUCERS};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "ACCRUE_DATA_DIR";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Ledger accounts and limits.
    #[serde(default)]
    pub ledger: LedgerSection,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// IPC settings.
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Core symbol as `precision,CODE`.
    #[serde(default = "default_core_symbol")]
    pub core_symbol: String,
    /// Account that initializes the ledger and co-signs vote changes.
    #[serde(default = "default_system_account")]
    pub system_account: String,
    /// Token ledger account whose transfers count as deposits.
    #[serde(default = "default_token_account")]
    pub token_account: String,
    #[serde(default = "default_max_vote_producers")]
    pub max_vote_producers: usize,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Database file name inside the data directory.
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

/// IPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Unix socket file name inside the data directory.
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
    /// Per-subscriber event buffer.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_core_symbol() -> String {
    "4,FLON".to_string()
}

fn default_system_account() -> String {
    "flon".to_string()
}

fn default_token_account() -> String {
    "flon.token".to_string()
}

fn default_max_vote_producers() -> usize {
    MAX_VOTE_PRODUCERS
}

fn default_db_file() -> String {
    "accrue.db".to_string()
}

fn default_socket_name() -> String {
    "daemon.sock".to_string()
}

fn default_event_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            core_symbol: default_core_symbol(),
            system_account: default_system_account(),
            token_account: default_token_account(),
            max_vote_producers: default_max_vote_producers(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            db_file: default_db_file(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            socket_name: default_socket_name(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl LedgerSection {
    /// Parsed core symbol.
    pub fn core_symbol(&self) -> anyhow::Result<Symbol> {
        Ok(self.core_symbol.parse()?)
    }

    /// Validated ledger configuration.
    pub fn to_ledger_config(&self) -> anyhow::Result<LedgerConfig> {
        if self.max_vote_producers == 0 {
            anyhow::bail!("ledger.max_vote_producers must be at least 1");
        }
        let mut config = LedgerConfig::new(
            Name::new(self.system_account.as_str())?,
            Name::new(self.token_account.as_str())?,
        );
        config.max_vote_producers = self.max_vote_producers;
        Ok(config)
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Database file path.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.db_file)
    }

    /// IPC socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir().join(&self.rpc.socket_name)
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Accrue")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".accrue")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/accrue"))
}
