use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use schedule_engine::{FetchSettings, RunSettings};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides `pdf_dir`.
pub const PDF_DIR_ENV: &str = "PDF_DIR";

const STORE_FILENAME: &str = "store.ron";

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    pdf_dir: Option<PathBuf>,
    terminals: Option<PathBuf>,
    store: Option<PathBuf>,
    #[serde(default)]
    fetch: FetchSection,
    #[serde(default)]
    run: RunSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FetchSection {
    request_timeout_secs: u64,
    connect_timeout_secs: u64,
    max_attempts: u32,
    initial_backoff_secs: u64,
    max_bytes: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        let defaults = FetchSettings::default();
        Self {
            request_timeout_secs: defaults.request_timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            max_attempts: defaults.max_attempts,
            initial_backoff_secs: defaults.initial_backoff.as_secs(),
            max_bytes: defaults.max_bytes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RunSection {
    max_concurrent_terminals: usize,
    terminal_timeout_secs: u64,
}

impl Default for RunSection {
    fn default() -> Self {
        let defaults = RunSettings::default();
        Self {
            max_concurrent_terminals: defaults.max_concurrent_terminals,
            terminal_timeout_secs: defaults.terminal_timeout.as_secs(),
        }
    }
}

/// Resolved configuration. Relative paths are anchored at the config file's directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub pdf_dir: PathBuf,
    pub terminals: PathBuf,
    pub store: PathBuf,
    pub fetch: FetchSettings,
    pub run: RunSettings,
}

/// Read and validate the TOML file at `path`.
///
/// `pdf_dir_override` is the value of [`PDF_DIR_ENV`], if set.
pub fn load_config(path: &Path, pdf_dir_override: Option<String>) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&text, base_dir, pdf_dir_override)
}

pub fn parse_config(
    text: &str,
    base_dir: &Path,
    pdf_dir_override: Option<String>,
) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(text)?;

    let pdf_dir = pdf_dir_override
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .or(raw.pdf_dir)
        .ok_or(ConfigError::Missing("pdf_dir"))?;
    let pdf_dir = anchor(base_dir, pdf_dir);
    let terminals = anchor(base_dir, raw.terminals.ok_or(ConfigError::Missing("terminals"))?);
    let store = match raw.store {
        Some(store) => anchor(base_dir, store),
        None => pdf_dir.join(STORE_FILENAME),
    };

    if raw.fetch.max_attempts == 0 {
        return Err(ConfigError::Invalid {
            name: "fetch.max_attempts",
            reason: "must be at least 1".to_string(),
        });
    }
    if raw.run.max_concurrent_terminals == 0 {
        return Err(ConfigError::Invalid {
            name: "run.max_concurrent_terminals",
            reason: "must be at least 1".to_string(),
        });
    }
    if raw.run.terminal_timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            name: "run.terminal_timeout_secs",
            reason: "must be at least 1".to_string(),
        });
    }

    let fetch = FetchSettings {
        request_timeout: Duration::from_secs(raw.fetch.request_timeout_secs),
        connect_timeout: Duration::from_secs(raw.fetch.connect_timeout_secs),
        max_attempts: raw.fetch.max_attempts,
        initial_backoff: Duration::from_secs(raw.fetch.initial_backoff_secs),
        max_bytes: raw.fetch.max_bytes,
        ..FetchSettings::default()
    };
    let run = RunSettings {
        max_concurrent_terminals: raw.run.max_concurrent_terminals,
        terminal_timeout: Duration::from_secs(raw.run.terminal_timeout_secs),
    };

    Ok(Config {
        pdf_dir,
        terminals,
        store,
        fetch,
        run,
    })
}

fn anchor(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
