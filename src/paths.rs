use std::path::PathBuf;
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use clap::Args;
use log::warn;
use serde::de::DeserializeOwned;

/// Common command line arguments for locating configuration and data.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration directory, defaults to $AUTHGATE_CONFIG or ~/.config/authgate.
    #[arg(long, short = 'c')]
    pub config_path: Option<PathBuf>,

    /// Data directory, defaults to $AUTHGATE_DATA or ~/.local/share/authgate.
    #[arg(long)]
    pub data_path: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn build_path_set(&self) -> Result<PathSet> {
        PathSet::new(self.config_path.clone(), self.data_path.clone())
    }

    pub fn load<T>(&self, name: &str) -> Result<T>
    where
        T: CommonConfig + Default + DeserializeOwned,
    {
        let ps = self.build_path_set()?;
        ps.load_config(name)
    }
}

pub struct PathSet {
    pub config_path: PathBuf,
    pub data_path: PathBuf,
    pub pki_path: PathBuf,
}

impl PathSet {
    pub fn new(config_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Result<Self> {
        // Determine config path
        let config_path = if let Some(path) = config_path {
            path
        } else if let Ok(path) = env::var("AUTHGATE_CONFIG") {
            PathBuf::from(path)
        } else {
            Self::home_dir()?.join(".config").join("authgate")
        };

        // Determine data path
        let data_path = if let Some(path) = data_path {
            path
        } else if let Ok(path) = env::var("AUTHGATE_DATA") {
            PathBuf::from(path)
        } else {
            Self::home_dir()?
                .join(".local")
                .join("share")
                .join("authgate")
        };

        // PKI path is always under config path
        let pki_path = config_path.join("pki");

        // Ensure all directories exist
        ensure_dir_exists(&config_path)
            .with_context(|| format!("ensure config directory: {}", config_path.display()))?;
        ensure_dir_exists(&data_path)
            .with_context(|| format!("ensure data directory: {}", data_path.display()))?;
        ensure_dir_exists(&pki_path)
            .with_context(|| format!("ensure pki directory: {}", pki_path.display()))?;

        Ok(Self {
            config_path,
            data_path,
            pki_path,
        })
    }

    pub fn load_config<T>(&self, name: &str) -> Result<T>
    where
        T: CommonConfig + Default + DeserializeOwned,
    {
        let path = self.config_path.join(format!("{name}.toml"));
        let mut cfg: T = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s).context("parse config toml")?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Config file for {name} not found, using defaults");
                T::default()
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }

    fn home_dir() -> Result<PathBuf> {
        let dir = std::env::var_os("HOME") // Unix/Linux/macOS
            .or_else(|| std::env::var_os("USERPROFILE")) // Windows
            .map(PathBuf::from);
        match dir {
            Some(dir) => Ok(dir),
            None => {
                bail!("could not determine home directory, please specify config path manually")
            }
        }
    }
}

/// Configuration types that validate and complete themselves after parsing.
pub trait CommonConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

pub fn ensure_dir_exists(path: &PathBuf) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            bail!("path '{}' exists but is not a directory", path.display());
        }
        return Ok(());
    }
    fs::create_dir_all(path)
        .with_context(|| format!("create directory: {}", path.display()))?;
    Ok(())
}
