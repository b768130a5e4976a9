//! Configuration for the whiteboard session server.

use std::path::{Path, PathBuf};

/// Server policy constants.
pub mod policy {
    use std::time::Duration;

    /// Delay between the last subscriber detaching and the session being
    /// dropped from the in-memory registry. The store copy is kept.
    pub const EVICTION_DELAY: Duration = Duration::from_secs(60);

    /// Outbound frames buffered per subscriber. A subscriber whose queue is
    /// full when a broadcast is enqueued is closed.
    pub const SUBSCRIBER_QUEUE_DEPTH: usize = 64;

    /// Commands buffered per session actor (HTTP and socket callers combined).
    pub const COMMAND_QUEUE_DEPTH: usize = 256;

    /// Length of minted session tokens over the 36-symbol alphabet (~36 bits).
    pub const SESSION_TOKEN_LEN: usize = 7;

    /// Length of minted element identifiers.
    pub const ELEMENT_ID_LEN: usize = 9;

    /// Length of minted subscriber user identifiers.
    pub const USER_ID_LEN: usize = 6;

    /// LMDB map size for the element store (1 GiB).
    pub const STORE_MAP_SIZE: usize = 1 << 30;

    /// Default listen port for HTTP and WebSocket upgrades.
    pub const DEFAULT_PORT: u16 = 3000;

    /// Default on-disk backing for the element store.
    pub const DEFAULT_DATA_DIR: &str = "./data";
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port for HTTP and WebSocket upgrades.
    pub port: u16,

    /// Data directory backing the element store.
    pub data_dir: PathBuf,
}

impl Config {
    /// Create a new configuration.
    #[must_use]
    pub fn new(port: u16, data_dir: impl Into<PathBuf>) -> Self {
        Self { port, data_dir: data_dir.into() }
    }

    /// Create a test configuration rooted at a scratch directory.
    ///
    /// Port 0 lets the OS pick a free port when a listener is actually bound.
    #[must_use]
    pub fn for_testing(data_dir: &Path) -> Self {
        Self { port: 0, data_dir: data_dir.to_path_buf() }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if `PORT` is set but not a valid port number.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse()?,
            Err(_) => policy::DEFAULT_PORT,
        };
        let data_dir =
            std::env::var("DATA_DIR").unwrap_or_else(|_| policy::DEFAULT_DATA_DIR.to_string());
        Ok(Self::new(port, data_dir))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(policy::DEFAULT_PORT, policy::DEFAULT_DATA_DIR)
    }
}
