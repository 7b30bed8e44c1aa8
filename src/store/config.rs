use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::paths::{CommonConfig, PathSet};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_filename")]
    pub filename: String,

    #[serde(skip)]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            filename: Self::default_filename(),
            path: PathBuf::new(),
        }
    }
}

impl CommonConfig for StoreConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.filename.is_empty() {
            bail!("store filename is required");
        }

        self.path = ps.data_path.join(&self.filename);
        Ok(())
    }
}

impl StoreConfig {
    fn default_filename() -> String {
        String::from("authgate.db")
    }
}
