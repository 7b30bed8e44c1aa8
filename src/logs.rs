use std::path::PathBuf;

use anyhow::{bail, Result};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::Append;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;
use serde::{Deserialize, Serialize};

use crate::paths::{ensure_dir_exists, CommonConfig, PathSet};

/// One line per event; decision outcomes land here, so the timestamp
/// precision matters when correlating with upstream access logs.
const LINE_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3f)} [{l}] {m}{n}";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogsConfig {
    #[serde(default)]
    pub target: LogTarget,

    #[serde(default)]
    pub level: LogLevel,

    /// How many rotated files to keep. File target only.
    #[serde(default = "LogsConfig::default_file_keep")]
    pub file_keep: u32,

    /// Size in MiB at which the current log file is rotated.
    #[serde(default = "LogsConfig::default_file_rotate_mib")]
    pub file_rotate_mib: u64,

    #[serde(skip)]
    logs_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    fn filter(&self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

impl CommonConfig for LogsConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if !matches!(self.target, LogTarget::File) {
            return Ok(());
        }

        if self.file_keep == 0 {
            bail!("file_keep must be greater than 0");
        }
        if self.file_rotate_mib == 0 {
            bail!("file_rotate_mib must be greater than 0");
        }

        self.logs_dir = ps.data_path.join("logs");
        ensure_dir_exists(&self.logs_dir)?;

        Ok(())
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        LogsConfig {
            target: LogTarget::default(),
            level: LogLevel::default(),
            file_keep: Self::default_file_keep(),
            file_rotate_mib: Self::default_file_rotate_mib(),
            logs_dir: PathBuf::new(),
        }
    }
}

impl LogsConfig {
    pub fn init(&self, name: &str) -> Result<()> {
        let appender: Box<dyn Append> = match self.target {
            LogTarget::Stdout => Box::new(Self::console(Target::Stdout)),
            LogTarget::Stderr => Box::new(Self::console(Target::Stderr)),
            LogTarget::File => Box::new(self.rolling_file(name)?),
        };

        let config = Config::builder()
            .appender(Appender::builder().build("gateway", appender))
            .build(Root::builder().appender("gateway").build(self.level.filter()))?;

        log4rs::init_config(config)?;
        Ok(())
    }

    fn console(target: Target) -> ConsoleAppender {
        ConsoleAppender::builder()
            .target(target)
            .encoder(Box::new(PatternEncoder::new(LINE_PATTERN)))
            .build()
    }

    fn rolling_file(&self, name: &str) -> Result<RollingFileAppender> {
        let path = self.logs_dir.join(format!("{name}.log"));
        let archived = self.logs_dir.join(format!("{name}.{{}}.log"));

        let roller = FixedWindowRoller::builder()
            .base(1)
            .build(&archived.display().to_string(), self.file_keep)?;
        let trigger = SizeTrigger::new(self.file_rotate_mib * 1024 * 1024);
        let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

        let appender = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LINE_PATTERN)))
            .build(path, Box::new(policy))?;
        Ok(appender)
    }

    fn default_file_keep() -> u32 {
        5
    }

    fn default_file_rotate_mib() -> u64 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_set() -> PathSet {
        let base = std::env::temp_dir().join("authgate-logs-test");
        PathSet::new(Some(base.join("config")), Some(base.join("data"))).unwrap()
    }

    #[test]
    fn test_complete() {
        let ps = path_set();

        // Console targets need no file settings
        let mut cfg = LogsConfig::default();
        cfg.complete(&ps).unwrap();

        // File target validates rotation settings
        let mut cfg = LogsConfig {
            target: LogTarget::File,
            file_keep: 0,
            ..Default::default()
        };
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = LogsConfig {
            target: LogTarget::File,
            file_rotate_mib: 0,
            ..Default::default()
        };
        assert!(cfg.complete(&ps).is_err());

        let mut cfg = LogsConfig {
            target: LogTarget::File,
            ..Default::default()
        };
        cfg.complete(&ps).unwrap();
        assert!(cfg.logs_dir.ends_with("logs"));
    }

    #[test]
    fn test_target_names() {
        // Config file spelling of the target values
        let cfg: LogsConfig = toml::from_str("target = \"stderr\"").unwrap();
        assert!(matches!(cfg.target, LogTarget::Stderr));

        let cfg: LogsConfig = toml::from_str("level = \"warning\"").unwrap();
        assert!(matches!(cfg.level, LogLevel::Warning));
    }
}
