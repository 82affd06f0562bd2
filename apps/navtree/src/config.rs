//! # Configuration
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. `navtree.toml` (or the file given with `--config`)
//! 3. `NAVTREE_*` environment variables
//! 4. Command-line flags
//!
//! ```toml
//! database = "navtree.redb"
//! backend = "redb"        # or "memory"
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100        # requests per second, 0 disables
//! api_key = "secret"      # omit to disable authentication
//! cors_origins = ["http://localhost:3000"]
//! ```

use navtree_core::MenuError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "navtree.toml";

/// Default rate limit: 100 requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Storage backend of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Volatile BTreeMap store, lost on exit.
    Memory,
    /// ACID redb database file.
    #[default]
    Redb,
}

impl Backend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redb => "redb",
        }
    }
}

impl FromStr for Backend {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redb" => Ok(Self::Redb),
            other => Err(MenuError::Validation(format!(
                "unknown backend '{other}' (expected memory or redb)"
            ))),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: PathBuf,
    pub backend: Backend,
    pub host: String,
    pub port: u16,
    pub rate_limit: u32,
    pub api_key: Option<String>,
    /// Allowed origins; `"*"` allows any. Empty means localhost only.
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("navtree.redb"),
            backend: Backend::Redb,
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load the config file and apply environment overrides.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, MenuError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, MenuError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MenuError::Io(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Parse TOML text; missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, MenuError> {
        toml::from_str(text).map_err(|e| MenuError::Serialization(format!("Invalid config: {e}")))
    }

    /// Apply `NAVTREE_*` overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), MenuError> {
        if let Some(v) = lookup("NAVTREE_DATABASE") {
            self.database = PathBuf::from(v);
        }
        if let Some(v) = lookup("NAVTREE_BACKEND") {
            self.backend = v.parse()?;
        }
        if let Some(v) = lookup("NAVTREE_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("NAVTREE_PORT") {
            self.port = parse_number("NAVTREE_PORT", &v)?;
        }
        if let Some(v) = lookup("NAVTREE_RATE_LIMIT") {
            self.rate_limit = parse_number("NAVTREE_RATE_LIMIT", &v)?;
        }
        if let Some(v) = lookup("NAVTREE_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("NAVTREE_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    /// The API key, if authentication is enabled.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, MenuError> {
    value
        .trim()
        .parse()
        .map_err(|_| MenuError::Validation(format!("{key} must be a number, got '{value}'")))
}

// =============================================================================
// TESTS
// =============================================================================
