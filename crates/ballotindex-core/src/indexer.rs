//! Indexer configuration and tracker state types.

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// Largest page the node serves for a single event query.
pub const MAX_PAGE_SIZE: usize = 50;

/// Configuration for an indexer process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Store location: `sqlite:…`, `postgres://…` or `memory:`.
    pub database_url: String,
    /// Sui network name (`mainnet`, `testnet`, `devnet`, `localnet`).
    pub network: String,
    /// JSON-RPC endpoint of the full node.
    pub rpc_url: String,
    /// Package that emits the election events.
    pub package_id: String,
    /// Module inside the package (usually `vote`).
    pub module_name: String,
    /// Delay between polls once a tracker has caught up (milliseconds).
    pub poll_interval_ms: u64,
    /// Events requested per query.
    pub page_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            database_url: "memory:".into(),
            network: "testnet".into(),
            rpc_url: "https://fullnode.testnet.sui.io:443".into(),
            package_id: String::new(),
            module_name: "vote".into(),
            poll_interval_ms: 5_000,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl IndexerConfig {
    /// Load from the process environment. See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self, IndexerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from a variable lookup:
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `DATABASE_URL` | required |
    /// | `SUI_NETWORK` | `testnet` |
    /// | `SUI_RPC_URL` | full node of `SUI_NETWORK` |
    /// | `PACKAGE_ID` | required |
    /// | `MODULE_NAME` | `vote` |
    /// | `POLLING_INTERVAL_MS` | `5000` |
    /// | `PAGE_SIZE` | `50` |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                IndexerError::Config(format!("missing required environment variable: {key}"))
            })
        };

        let defaults = Self::default();
        let network = get("SUI_NETWORK").unwrap_or(defaults.network);
        let rpc_url = match get("SUI_RPC_URL") {
            Some(url) => url,
            None => fullnode_url(&network)
                .ok_or_else(|| {
                    IndexerError::Config(format!(
                        "unknown SUI_NETWORK '{network}' (set SUI_RPC_URL explicitly)"
                    ))
                })?
                .to_string(),
        };

        let config = Self {
            database_url: required("DATABASE_URL")?,
            network,
            rpc_url,
            package_id: required("PACKAGE_ID")?,
            module_name: get("MODULE_NAME").unwrap_or(defaults.module_name),
            poll_interval_ms: parse_var(&get, "POLLING_INTERVAL_MS", defaults.poll_interval_ms)?,
            page_size: parse_var(&get, "PAGE_SIZE", defaults.page_size)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that the loops rely on.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.package_id.trim().is_empty() {
            return Err(IndexerError::Config("package_id must not be empty".into()));
        }
        if self.module_name.trim().is_empty() {
            return Err(IndexerError::Config("module_name must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(IndexerError::Config("poll_interval_ms must be greater than zero".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(IndexerError::Config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_var<G, T>(get: &G, key: &str, default: T) -> Result<T, IndexerError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| IndexerError::Config(format!("invalid value for {key}: {raw:?}"))),
    }
}

/// Public full-node endpoint for a named Sui network.
pub fn fullnode_url(network: &str) -> Option<&'static str> {
    match network {
        "mainnet" => Some("https://fullnode.mainnet.sui.io:443"),
        "testnet" => Some("https://fullnode.testnet.sui.io:443"),
        "devnet" => Some("https://fullnode.devnet.sui.io:443"),
        "localnet" => Some("http://127.0.0.1:9000"),
        _ => None,
    }
}

/// Where a tracker loop is in its poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    /// Waiting for the next poll.
    Idle,
    /// Querying the node for the next page.
    Fetching,
    /// Handing the page to the handler.
    Applying,
    /// Saving the advanced cursor.
    Persisting,
    /// Shut down.
    Stopped,
}

impl std::fmt::Display for TrackerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Applying => write!(f, "applying"),
            Self::Persisting => write!(f, "persisting"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
