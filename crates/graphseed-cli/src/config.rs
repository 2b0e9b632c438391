//! Connection settings: flags and environment, then the config file, then defaults.

use anyhow::{Context, Result};
use clap::Args;
use graphseed_seed::ConnectionConfig;
use graphseed_store::Credentials;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:8529";
pub const DEFAULT_DATABASE: &str = "app";
pub const DEFAULT_USER: &str = "app";
pub const DEFAULT_ROOT_USER: &str = "root";
pub const DEFAULT_SEEDS: &str = "seeds.yaml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Config file (defaults are $HOME/config.yaml and ./config.yaml)
    #[arg(long, env = "GRAPHSEED_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database endpoint
    #[arg(long, env = "GRAPHSEED_URL", global = true)]
    pub url: Option<String>,

    /// Application database name
    #[arg(long, env = "GRAPHSEED_DATABASE", global = true)]
    pub database: Option<String>,

    /// Application user
    #[arg(long, env = "GRAPHSEED_USER", global = true)]
    pub user: Option<String>,

    /// Application password
    #[arg(long, env = "GRAPHSEED_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Administrator used by `create`, `drop` and `reset`
    #[arg(long, env = "GRAPHSEED_ROOT_USER", global = true)]
    pub root_user: Option<String>,

    #[arg(long, env = "GRAPHSEED_ROOT_PASSWORD", global = true, hide_env_values = true)]
    pub root_password: Option<String>,

    /// Seed manifest
    #[arg(long, env = "GRAPHSEED_SEEDS", global = true)]
    pub seeds: Option<PathBuf>,

    /// Request timeout in seconds, 0 for none
    #[arg(long, env = "GRAPHSEED_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

/// `config.yaml` layout.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub database: DatabaseSection,
    pub seeds: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub root_user: Option<String>,
    pub root_password: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Fully resolved settings for one CLI invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub admin: Credentials,
    pub seeds: PathBuf,
    pub timeout: Option<Duration>,
    /// Config file that contributed, if any.
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Resolve from flags/environment and the config file they point at (or
    /// the first default config file that exists).
    pub fn resolve(args: &ConnectionArgs) -> Result<Self> {
        let config_file = match &args.config {
            Some(path) => Some(path.clone()),
            None => default_config_file(),
        };
        let file = match &config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let mut settings = Self::merge(args, file);
        settings.config_file = config_file;
        Ok(settings)
    }

    pub fn merge(args: &ConnectionArgs, file: FileConfig) -> Self {
        let db = file.database;
        let pick = |flag: &Option<String>, from_file: Option<String>, default: &str| {
            flag.clone()
                .or(from_file)
                .unwrap_or_else(|| default.to_string())
        };

        let connection = ConnectionConfig {
            endpoint: pick(&args.url, db.url, DEFAULT_URL),
            database: pick(&args.database, db.name, DEFAULT_DATABASE),
            user: pick(&args.user, db.user, DEFAULT_USER),
            password: pick(&args.password, db.password, ""),
        };
        let admin = Credentials::new(
            pick(&args.root_user, db.root_user, DEFAULT_ROOT_USER),
            pick(&args.root_password, db.root_password, ""),
        );
        let seeds = args
            .seeds
            .clone()
            .or(file.seeds)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SEEDS));
        let timeout = match args.timeout.or(db.timeout_secs).unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            connection,
            admin,
            seeds,
            timeout,
            config_file: None,
        }
    }
}

fn default_config_file() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME));
    home.into_iter()
        .chain(std::iter::once(PathBuf::from(CONFIG_FILE_NAME)))
        .find(|path| path.is_file())
}
