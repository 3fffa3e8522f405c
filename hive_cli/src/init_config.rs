use std::{fs, io::Write, path::Path};

use anyhow::Context;
use clap::Subcommand;
use hive_gateway::{HiveConfig, StoreConfig};
use tracing::info;

#[derive(Subcommand)]
pub enum CmdConfig {
    /// Creates the config file if it doesn't exist
    Init {
        /// Use the volatile in-memory store instead of a Kubo node
        #[arg(long)]
        memory: bool,
    },
    /// Prints the effective config
    Show,
}

impl CmdConfig {
    pub fn run(self, config_file: &Path) -> anyhow::Result<()> {
        match self {
            Self::Init { memory } => {
                if config_file.exists() {
                    info!("config file {config_file:?} already exists");
                    return Ok(());
                }
                let mut config = HiveConfig::default();
                if memory {
                    config.store = StoreConfig::Memory;
                }
                info!("writing to config file {config_file:?}");
                write_config(config_file, &config)
            }
            Self::Show => {
                let config = load_config(config_file)?;
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        }
    }
}

pub fn load_config(config_file: &Path) -> anyhow::Result<HiveConfig> {
    let text = fs::read_to_string(config_file).with_context(|| {
        format!("could not read config file {config_file:?}, run `hive config init` first")
    })?;
    toml::from_str(&text).with_context(|| format!("could not parse config file {config_file:?}"))
}

/// Replaces `config_file` atomically.
pub fn write_config(config_file: &Path, config: &HiveConfig) -> anyhow::Result<()> {
    if let Some(parent) = config_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = config_file.with_extension("tmp");
    let mut tmp = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;
    tmp.write_all(toml::to_string_pretty(config)?.as_bytes())?;
    tmp.sync_all()?;
    fs::rename(&tmp_path, config_file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested/config.toml");
        CmdConfig::Init { memory: true }.run(&file).unwrap();

        let config = load_config(&file).unwrap();
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.gateway.request_timeout_secs, 30);
        assert!(!file.with_extension("tmp").exists());
    }

    #[test]
    fn test_init_keeps_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, "[store]\ntype = \"memory\"\n").unwrap();
        CmdConfig::Init { memory: false }.run(&file).unwrap();
        assert_eq!(load_config(&file).unwrap().store, StoreConfig::Memory);
    }

    #[test]
    fn test_missing_config_mentions_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("hive config init"));
    }
}
