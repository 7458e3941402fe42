use std::{net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

pub const DEFAULT_ROUND_INTERVAL_MS: u64 = 200;

/// Node settings the host hands to the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the local host accepts user connections on.
    pub listen: SocketAddr,
    /// Directory holding one `<uri>.log` file per record.
    pub data_dir: PathBuf,
    /// Observer nodes run every round in read-only mode.
    pub read_only: bool,
    pub round_interval_ms: u64,
    /// Trusted peer addresses.
    pub peers: Vec<String>,
}

impl NodeConfig {
    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms.max(1))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_dir: PathBuf::from("records"),
            read_only: false,
            round_interval_ms: DEFAULT_ROUND_INTERVAL_MS,
            peers: Vec::new(),
        }
    }
}
