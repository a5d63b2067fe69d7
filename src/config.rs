//! TOML configuration file support.
//!
//! Loads from (in order):
//! 1. an explicit `--config` path
//! 2. `certchain.toml` next to the executable
//! 3. `~/.config/certchain/config.toml` (`%APPDATA%\certchain\config.toml` on Windows)
//! 4. built-in defaults
//!
//! then applies environment overrides (`CERTCHAIN_*`).  CLI arguments always
//! take precedence over config file values.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, ResultExt as _};
use crate::roles::AuthorityPolicy;

// ---------------------------------------------------------------------------
// Config structs (map 1-to-1 with the TOML sections)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CertchainConfig {
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
    pub authority: AuthorityConfig,
    pub links: LinksConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub journal: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Path to a JSON-lines structured log file.  Empty means no file logging.
    pub json_log_file: String,
    /// Emit JSON to stdout instead of human-readable text.
    pub json_stdout: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// `full`, `simplified` or `minimal`.  Only read when a journal is
    /// created; an existing journal keeps the profile it was created with.
    pub profile: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Base of the `{base_url}/verify/{batch_id}` links printed for QR codes.
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            journal: PathBuf::from("certchain-journal.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_log_file: String::new(),
            json_stdout: false,
        }
    }
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            profile: "full".to_string(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            base_url: "https://trace.example.org".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl AuthorityConfig {
    pub fn policy(&self) -> Result<AuthorityPolicy> {
        self.profile.parse()
    }
}

impl CertchainConfig {
    /// Try to load from a specific path.  Returns `Ok(default)` if the file
    /// does not exist; returns `Err` if the file exists but is malformed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .ctx_config(&format!("read config file {}", path.display()))?;
        let cfg: CertchainConfig = toml::from_str(&text).ctx_config("parse config TOML")?;
        cfg.authority.policy()?;
        Ok(cfg)
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }

        if let Ok(exe) = std::env::current_exe() {
            let candidate = exe.with_file_name("certchain.toml");
            if candidate.exists() {
                return Self::load_from(&candidate);
            }
        }

        #[cfg(windows)]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                let candidate = PathBuf::from(appdata).join("certchain").join("config.toml");
                if candidate.exists() {
                    return Self::load_from(&candidate);
                }
            }
        }

        #[cfg(not(windows))]
        {
            if let Some(home) = std::env::var_os("HOME") {
                let candidate = PathBuf::from(home)
                    .join(".config")
                    .join("certchain")
                    .join("config.toml");
                if candidate.exists() {
                    return Self::load_from(&candidate);
                }
            }
        }

        Ok(Self::default())
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("CERTCHAIN_JOURNAL") {
            self.paths.journal = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("CERTCHAIN_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(url) = std::env::var("CERTCHAIN_BASE_URL") {
            self.links.base_url = url;
        }
        if let Ok(profile) = std::env::var("CERTCHAIN_AUTHORITY") {
            self.authority.profile = profile;
        }
    }
}
