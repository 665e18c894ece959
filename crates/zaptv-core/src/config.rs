use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sidebar categories.  Each one names a playlist source; selecting a
    /// category in the UI reloads from its URL.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub epg: EpgConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    /// URL or local file path of the M3U playlist for this category.
    pub playlist_url: String,
    /// Overrides the playlist's own `url-tvg` header when set.
    #[serde(default)]
    pub epg_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Delay between stream-load retries.  Retries are unbounded: live
    /// sources hiccup routinely and a TV surface has no retry button.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Rows moved per Channel-Up/Channel-Down press while the in-player
    /// switcher overlay is open.
    #[serde(default = "default_zap_step")]
    pub zap_step: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgConfig {
    /// Cadence of the display-only now/next recomputation.
    #[serde(default = "default_epg_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay_secs(),
            zap_step: default_zap_step(),
        }
    }
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_epg_refresh_secs(),
        }
    }
}

fn default_retry_delay_secs() -> u64 {
    3
}

fn default_zap_step() -> usize {
    1
}

fn default_epg_refresh_secs() -> u64 {
    30
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![CategoryConfig {
        name: "All channels".to_string(),
        playlist_url: "https://iptv-org.github.io/iptv/index.m3u".to_string(),
        epg_url: None,
    }]
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            playback: PlaybackConfig::default(),
            epg: EpgConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.playback.retry_delay_secs, 3);
        assert_eq!(config.playback.zap_step, 1);
        assert_eq!(config.epg.refresh_secs, 30);
        assert!(!config.categories.is_empty());
        assert!(config.categories[0].playlist_url.starts_with("https://"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[[categories]]
name = "Local"
playlist_url = "/tmp/list.m3u"
"#,
        )
        .unwrap();
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[0].name, "Local");
        assert_eq!(config.playback.retry_delay_secs, 3);
    }
}
