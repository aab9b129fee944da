//! Fluent builder API for indexer configs.
//!
//! # Example
//!
//! ```rust,no_run
//! use ballotindex_sui::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .network("devnet")
//!     .package("0x2a")
//!     .database_url("sqlite:./ballots.db")
//!     .poll_interval_ms(1_000)
//!     .build()
//!     .unwrap();
//! ```

use ballotindex_core::error::IndexerError;
use ballotindex_core::indexer::{fullnode_url, IndexerConfig};

/// Fluent builder for [`IndexerConfig`].
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
    rpc_url_set: bool,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a named network. Also points the RPC URL at its public full
    /// node unless [`rpc_url`](Self::rpc_url) is set explicitly.
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.config.network = network.into();
        if !self.rpc_url_set {
            if let Some(url) = fullnode_url(&self.config.network) {
                self.config.rpc_url = url.to_string();
            }
        }
        self
    }

    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.rpc_url = url.into();
        self.rpc_url_set = true;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = url.into();
        self
    }

    /// Package that publishes the election module.
    pub fn package(mut self, package_id: impl Into<String>) -> Self {
        self.config.package_id = package_id.into();
        self
    }

    pub fn module(mut self, module_name: impl Into<String>) -> Self {
        self.config.module_name = module_name.into();
        self
    }

    /// Delay between polls once caught up.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Events requested per query.
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Build without validation.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// Build and validate.
    pub fn build(self) -> Result<IndexerConfig, IndexerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = IndexerBuilder::new().build_config();
        assert_eq!(cfg.network, "testnet");
        assert_eq!(cfg.module_name, "vote");
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.poll_interval_ms, 5_000);
    }

    #[test]
    fn network_sets_fullnode_unless_overridden() {
        let cfg = IndexerBuilder::new().network("mainnet").build_config();
        assert_eq!(cfg.rpc_url, "https://fullnode.mainnet.sui.io:443");

        let cfg = IndexerBuilder::new()
            .rpc_url("http://10.0.0.5:9000")
            .network("mainnet")
            .build_config();
        assert_eq!(cfg.rpc_url, "http://10.0.0.5:9000");
    }

    #[test]
    fn build_validates() {
        assert!(IndexerBuilder::new().build().is_err(), "package id is required");

        let cfg = IndexerBuilder::new()
            .package("0x2a")
            .module("ballot")
            .page_size(20)
            .build()
            .unwrap();
        assert_eq!(cfg.module_name, "ballot");

        let err = IndexerBuilder::new().package("0x2a").page_size(0).build().unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }
}
