use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

use ketovital_core::db::Database;

pub const ENV_DB: &str = "KETOVITAL_DB";
pub const ENV_BACKEND_URL: &str = "KETOVITAL_BACKEND_URL";
pub const ENV_TOKEN: &str = "KETOVITAL_TOKEN";

pub const SETTING_BACKEND_URL: &str = "backend_url";
pub const SETTING_AUTO_SYNC: &str = "auto_sync";
pub const SETTING_TIMEOUT: &str = "timeout_secs";

pub const KNOWN_SETTINGS: [&str; 3] = [SETTING_BACKEND_URL, SETTING_AUTO_SYNC, SETTING_TIMEOUT];

const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    /// Resolves the database path: `--db` flag, then `KETOVITAL_DB`, then the
    /// platform data directory.
    pub fn load(db_flag: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_flag.or_else(|| env_var(ENV_DB).map(PathBuf::from)) {
            Some(path) => path,
            None => {
                let proj_dirs = ProjectDirs::from("", "", "ketovital")
                    .context("Could not determine home directory")?;
                proj_dirs.data_dir().join("ketovital.db")
            }
        };

        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        }

        Ok(Config { db_path })
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Values supplied on the command line, highest priority.
#[derive(Debug, Clone, Default)]
pub struct RemoteFlags {
    pub backend_url: Option<String>,
    pub token: Option<String>,
}

/// Everything needed to talk to the remote backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub auto_sync: bool,
    pub timeout: Duration,
}

impl RemoteSettings {
    pub fn load(db: &Database, flags: &RemoteFlags) -> Result<Self> {
        Self::resolve(db, flags, env_var)
    }

    /// Priority per value: flag, environment, persisted setting, default.
    /// The credential is never persisted.
    pub fn resolve(
        db: &Database,
        flags: &RemoteFlags,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let endpoint = match flags.backend_url.clone().or_else(|| env(ENV_BACKEND_URL)) {
            Some(url) => Some(url),
            None => db.get_setting(SETTING_BACKEND_URL)?,
        };
        let token = flags.token.clone().or_else(|| env(ENV_TOKEN));

        let auto_sync = match db.get_setting(SETTING_AUTO_SYNC)? {
            Some(v) => parse_bool(&v)?,
            None => false,
        };
        let timeout_secs = match db.get_setting(SETTING_TIMEOUT)? {
            Some(v) => parse_timeout(&v)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            endpoint,
            token,
            auto_sync,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Both an endpoint and a credential are present.
    pub fn can_sync(&self) -> bool {
        self.endpoint.is_some() && self.token.is_some()
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => bail!("Invalid boolean '{value}'. Use true or false"),
    }
}

fn parse_timeout(value: &str) -> Result<u64> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid timeout '{value}'. Use a whole number of seconds"))?;
    if secs == 0 {
        bail!("Timeout must be at least 1 second");
    }
    Ok(secs)
}

/// Validates a `config set` value and returns it in its stored form.
pub fn normalize_setting(key: &str, value: &str) -> Result<String> {
    match key {
        SETTING_BACKEND_URL => {
            let url = value.trim().trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("Backend URL must start with http:// or https://");
            }
            Ok(url.to_string())
        }
        SETTING_AUTO_SYNC => Ok(parse_bool(value)?.to_string()),
        SETTING_TIMEOUT => Ok(parse_timeout(value)?.to_string()),
        _ => bail!(
            "Unknown setting '{key}'. Known settings: {}",
            KNOWN_SETTINGS.join(", ")
        ),
    }
}
