use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Free space left untouched when filling, in MB.
pub const DEFAULT_RESERVE_MB: u64 = 510;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fill: FillConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// MB of free space to keep after filling (500 + 10 of headroom)
    pub reserve_mb: u64,
}

/// Bounds on external commands, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// `df -P` / `mount` queries
    pub mount_query_sec: u64,
    /// `fsutil file createnew` (metadata only, fast)
    pub fsutil_sec: u64,
    /// `dd` block fill; writes every byte
    pub dd_sec: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for FillConfig {
    fn default() -> Self {
        Self { reserve_mb: DEFAULT_RESERVE_MB }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { mount_query_sec: 5, fsutil_sec: 60, dd_sec: 3600 }
    }
}

impl TimeoutConfig {
    pub fn mount_query(&self) -> Duration {
        Duration::from_secs(self.mount_query_sec)
    }
}

// ── Load ──────────────────────────────────────────────────────────────

impl Config {
    /// Read the config file if there is one. Never writes it.
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some(p) => p,
            None    => return Config::default(),
        };
        if !path.exists() {
            return Config::default();
        }
        match load_from(&path) {
            Ok(c)  => c,
            Err(e) => {
                log::warn!("ignoring {}: {e:#}", path.display());
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("diskfill").join("diskfill.toml"))
    }
}

fn load_from(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&text)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.fill.reserve_mb, 510);
        assert_eq!(cfg.timeouts.dd_sec, 3600);
        assert_eq!(cfg.timeouts.mount_query(), Duration::from_secs(5));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str("[fill]\nreserve_mb = 64\n\n[timeouts]\ndd_sec = 10\n").unwrap();
        assert_eq!(cfg.fill.reserve_mb, 64);
        assert_eq!(cfg.timeouts.dd_sec, 10);
        assert_eq!(cfg.timeouts.fsutil_sec, 60);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diskfill.toml");
        fs::write(&path, "[fill]\nreserve_mb = \"lots\"\n").unwrap();
        assert!(load_from(&path).is_err());
    }
}
