use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::app::Theme;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// API root; endpoint paths such as `/summaries/` are appended to it
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Starting display theme for the shell
    #[serde(default)]
    pub theme: Theme,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            theme: Theme::default(),
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            profiles: HashMap::new(),
        }
    }
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TOML)?;
        Ok(path)
    }

    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub theme: Theme,
    /// Profile name that was resolved (for display, and to key credentials)
    pub profile_name: String,
    pub credentials_path: PathBuf,
}

impl ResolvedConfig {
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        base_url_override: Option<&str>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        Self {
            base_url: base_url_override
                .map(str::to_string)
                .unwrap_or(base.base_url),
            theme: base.theme,
            credentials_path: credentials_path(&profile_name),
            profile_name,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notesum")
        .join("config.toml")
}

/// One credential file per profile so switching servers doesn't leak tokens.
pub fn credentials_path(profile: &str) -> PathBuf {
    data_dir().join(profile).join("credentials.json")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(std::env::var("HOME").unwrap_or_default()).join(".local/share")
        })
        .join("notesum")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# notesum configuration
# Run `notesum --init` to regenerate this file.

default_profile = "local"

# ── Local development server ──────────────────────────────────────────────────
[profiles.local]
base_url = "http://localhost:8000/api"
theme    = "light"

# ── Hosted instance ───────────────────────────────────────────────────────────
# [profiles.hosted]
# base_url = "https://notes.example.com/api"
# theme    = "dark"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses() {
        let file: ConfigFile = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(file.default_profile, "local");
        let local = file.resolve_profile(None).unwrap();
        assert_eq!(local.base_url, DEFAULT_BASE_URL);
        assert_eq!(local.theme, Theme::Light);
    }

    #[test]
    fn test_resolve_prefers_overrides() {
        let file: ConfigFile = toml::from_str(
            r#"
            default_profile = "a"
            [profiles.a]
            base_url = "http://a/api"
            [profiles.b]
            base_url = "http://b/api"
            theme = "dark"
            "#,
        )
        .unwrap();

        let a = ResolvedConfig::resolve(&file, None, None);
        assert_eq!(a.profile_name, "a");
        assert_eq!(a.base_url, "http://a/api");

        let b = ResolvedConfig::resolve(&file, Some("b"), None);
        assert_eq!(b.base_url, "http://b/api");
        assert_eq!(b.theme, Theme::Dark);
        assert!(b.credentials_path.ends_with("b/credentials.json"));

        let over = ResolvedConfig::resolve(&file, Some("b"), Some("http://c/api"));
        assert_eq!(over.base_url, "http://c/api");
    }

    #[test]
    fn test_unknown_profile_falls_back_to_defaults() {
        let file = ConfigFile::default();
        let resolved = ResolvedConfig::resolve(&file, Some("missing"), None);
        assert_eq!(resolved.profile_name, "missing");
        assert_eq!(resolved.base_url, DEFAULT_BASE_URL);
        assert_eq!(resolved.theme, Theme::Light);
    }
}
