// Settings module: the two knobs the tool has, read from the environment
// the same way the CLI flags in `main.rs` can override them.

use std::path::PathBuf;

/// Default REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

pub const API_URL_VAR: &str = "GHAUTH_API_URL";
pub const CACHE_DIR_VAR: &str = "GHAUTH_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL without a trailing slash.
    pub api_url: String,
    /// Directory holding the `.<app>.conf` token file.
    pub cache_dir: PathBuf,
}

impl Settings {
    /// Read `GHAUTH_API_URL` and `GHAUTH_CACHE_DIR`, falling back to
    /// `https://api.github.com` and the user's home directory.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_url = lookup(API_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.into());
        let cache_dir = lookup(CACHE_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);
        Settings {
            api_url: normalize_url(&api_url),
            cache_dir,
        }
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = normalize_url(url);
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = dir;
        self
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
