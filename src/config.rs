//! Server configuration.
//!
//! Layered: defaults, then a config file, then environment variables, then
//! CLI flags, each overriding the last. Port, backlog, and client count are
//! mandatory — `Config::load` errors rather than defaulting when one is
//! missing from every layer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_STORAGE_PATH: &str = "bets.log";
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Config as loaded from a file; every field optional here because the file
/// itself may be partial or absent — required-ness is enforced once file,
/// env, and CLI layers are merged.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    port: Option<u16>,
    listen_backlog: Option<u32>,
    client_count: Option<usize>,
    storage_path: Option<PathBuf>,
    read_timeout_secs: Option<u64>,
    log_file: Option<PathBuf>,
}

/// Fully-resolved configuration the acceptor runs with.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub listen_backlog: u32,
    pub client_count: usize,
    pub storage_path: PathBuf,
    pub read_timeout_secs: u64,
    pub log_file: Option<PathBuf>,
}

/// CLI-flag overrides, plumbed in from `clap` so a flag wins over both the
/// config file and the environment.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub listen_backlog: Option<u32>,
    pub client_count: Option<usize>,
    pub storage_path: Option<PathBuf>,
    pub read_timeout_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load from `config_path` (if it exists), apply environment overrides,
    /// then CLI overrides, and validate that every required field (port,
    /// backlog, client count) ended up set.
    pub fn load(config_path: &Path, cli: &CliOverrides) -> Result<Self> {
        let mut file_config = load_from_file(config_path)
            .with_context(|| format!("failed to load config file at {config_path:?}"))?;

        apply_env_overrides(&mut file_config);

        let port = cli
            .port
            .or(file_config.port)
            .context("missing required config field: port (set in config file, LOTTO_PORT, or --port)")?;
        let listen_backlog = cli.listen_backlog.or(file_config.listen_backlog).context(
            "missing required config field: listen_backlog (set in config file, LOTTO_LISTEN_BACKLOG, or --listen-backlog)",
        )?;
        let client_count = cli.client_count.or(file_config.client_count).context(
            "missing required config field: client_count (set in config file, LOTTO_CLIENT_COUNT, or --client-count)",
        )?;
        let storage_path = cli
            .storage_path
            .clone()
            .or(file_config.storage_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH));
        let read_timeout_secs = cli
            .read_timeout_secs
            .or(file_config.read_timeout_secs)
            .unwrap_or(DEFAULT_READ_TIMEOUT_SECS);
        let log_file = cli.log_file.clone().or(file_config.log_file);

        Ok(Config {
            port,
            listen_backlog,
            client_count,
            storage_path,
            read_timeout_secs,
            log_file,
        })
    }
}

fn load_from_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = std::fs::read_to_string(path)?;
    let parsed: FileConfig = serde_yaml::from_str(&contents)?;
    Ok(parsed)
}

fn apply_env_overrides(config: &mut FileConfig) {
    if let Some(port) = env_parsed("LOTTO_PORT") {
        config.port = Some(port);
    }
    if let Some(backlog) = env_parsed("LOTTO_LISTEN_BACKLOG") {
        config.listen_backlog = Some(backlog);
    }
    if let Some(count) = env_parsed("LOTTO_CLIENT_COUNT") {
        config.client_count = Some(count);
    }
    if let Ok(path) = std::env::var("LOTTO_STORAGE_PATH") {
        config.storage_path = Some(PathBuf::from(path));
    }
    if let Some(timeout) = env_parsed("LOTTO_READ_TIMEOUT_SECS") {
        config.read_timeout_secs = Some(timeout);
    }
    if let Ok(path) = std::env::var("LOTTO_LOG_FILE") {
        config.log_file = Some(PathBuf::from(path));
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
