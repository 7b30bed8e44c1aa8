use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::paths::{CommonConfig, PathSet};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityConfig {
    /// HS256 secret shared with the upstream content system's token issuer.
    #[serde(default)]
    pub secret: String,

    /// Prefix applied to raw subject ids to form the stable subject key
    /// sent to the decision service.
    #[serde(default = "IdentityConfig::default_subject_prefix")]
    pub subject_prefix: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            secret: String::new(),
            subject_prefix: Self::default_subject_prefix(),
        }
    }
}

impl CommonConfig for IdentityConfig {
    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.secret.is_empty() {
            bail!("identity secret is required");
        }
        Ok(())
    }
}

impl IdentityConfig {
    fn default_subject_prefix() -> String {
        String::from("user-")
    }
}
