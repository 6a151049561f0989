//! # Ledger Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DAFTAR_PAGE_SIZE=500                                               │
//! │     DAFTAR_EXCESS_POLICY=reject                                        │
//! │     DAFTAR_DB_PATH=/var/lib/daftar/ledger.db                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/daftar/ledger.toml (Linux)                               │
//! │     ~/Library/Application Support/com.daftar.daftar/ledger.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [ledger]
//! page_size = 1000
//! excess_policy = "return"   # return | reject
//!
//! [store]
//! database_path = "daftar.db"
//! max_connections = 5
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::store::DEFAULT_PAGE_SIZE;

// =============================================================================
// Excess Policy
// =============================================================================

/// What happens to the part of a collection that exceeds the customer's debt.
///
/// ```text
/// debt 40, collect 100
///
///   RETURN (default)                 REJECT
///   ────────────────                 ──────
///   40 applied                       nothing applied
///   60 reported as unallocated       ExceedsOutstanding error
///   (cashier hands it back)          (cashier re-enters the amount)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcessPolicy {
    #[default]
    Return,
    Reject,
}

impl std::fmt::Display for ExcessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExcessPolicy::Return => write!(f, "return"),
            ExcessPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for ExcessPolicy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "return" => Ok(ExcessPolicy::Return),
            "reject" => Ok(ExcessPolicy::Reject),
            other => Err(LedgerError::InvalidConfig(format!(
                "Unknown excess policy: '{}'. Valid options: return, reject",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Rows per page for full-history fetches.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub excess_policy: ExcessPolicy,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            page_size: default_page_size(),
            excess_policy: ExcessPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("daftar.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.ledger.page_size == 0 {
            return Err(LedgerError::InvalidConfig(
                "page_size must be greater than 0".into(),
            ));
        }
        if self.store.max_connections == 0 {
            return Err(LedgerError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("DAFTAR_PAGE_SIZE") {
            match size.parse::<u32>() {
                Ok(s) => self.ledger.page_size = s,
                Err(_) => warn!(value = %size, "Ignoring non-numeric DAFTAR_PAGE_SIZE"),
            }
        }

        if let Ok(policy) = std::env::var("DAFTAR_EXCESS_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding excess policy from environment");
                    self.ledger.excess_policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown excess policy in environment"),
            }
        }

        if let Ok(path) = std::env::var("DAFTAR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = PathBuf::from(path);
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "daftar", "daftar")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }
}
