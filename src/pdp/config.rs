use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::paths::{CommonConfig, PathSet};

/// Static decision service settings. The connection itself (URL and API
/// token) is administrator-managed state in the settings store, not in the
/// config file; only tuning knobs live here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PdpConfig {
    /// Bound on every decision service call. Expiry is treated like any
    /// other decision error: fail open.
    #[serde(default = "PdpConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PdpConfig {
    fn default() -> Self {
        PdpConfig {
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl CommonConfig for PdpConfig {
    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

impl PdpConfig {
    fn default_timeout_secs() -> u64 {
        5
    }
}
