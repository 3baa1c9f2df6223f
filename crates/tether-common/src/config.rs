//! Node configuration file.
//!
//! Stored as JSON. Every field is optional on disk; missing fields take the
//! values from [`NodeConfig::default`].
//!
//! ```json
//! {
//!   "identity_key": "tether.key",
//!   "listen_addr": "0.0.0.0:46656",
//!   "io_timeout_secs": 30,
//!   "expected_peer": null
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:46656";
pub const DEFAULT_IDENTITY_KEY: &str = "tether.key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Path to the 32-byte Ed25519 private key file.
    pub identity_key: PathBuf,
    pub listen_addr: String,
    /// Socket read/write timeout. `None` blocks forever.
    pub io_timeout_secs: Option<u64>,
    /// Hex node id the peer must present.
    pub expected_peer: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity_key: PathBuf::from(DEFAULT_IDENTITY_KEY),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            io_timeout_secs: None,
            expected_peer: None,
        }
    }
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded node config");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(Error::config("listen_addr is empty"));
        }
        if self.io_timeout_secs == Some(0) {
            return Err(Error::config("io_timeout_secs must be greater than 0"));
        }
        self.expected_peer_bytes()?;
        Ok(())
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_secs.map(Duration::from_secs)
    }

    /// Decode the pinned node id, if any.
    pub fn expected_peer_bytes(&self) -> Result<Option<[u8; 32]>> {
        let Some(node_id) = &self.expected_peer else {
            return Ok(None);
        };

        let bytes = hex::decode(node_id.trim())
            .map_err(|e| Error::config(format!("expected_peer: {}", e)))?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            Error::config(format!("expected_peer: {} bytes, expected 32", b.len()))
        })?;
        Ok(Some(key))
    }
}
