use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for XDG config/state directories.
pub const APP_NAME: &str = "save-answersheets";

/// Headless browser parameters (`[browser]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chrome/Chromium/Edge binary. When unset, the browser is auto-detected.
    pub executable: Option<PathBuf>,
    /// Extra command-line flags passed to the browser.
    pub args: Vec<String>,
    /// Run without a visible window.
    pub headless: bool,
    /// Upper bound for navigation plus network settling, per page.
    pub navigation_timeout_secs: u64,
    /// How long the network must stay quiet before printing.
    pub network_idle_ms: u64,
    /// In-flight requests still tolerated as "idle" (0 = fully idle).
    pub max_idle_inflight: usize,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
            ],
            headless: true,
            navigation_timeout_secs: 300,
            network_idle_ms: 500,
            max_idle_inflight: 0,
        }
    }
}

impl BrowserSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }
}

/// Global configuration loaded from `~/.config/save-answersheets/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory receiving `<identifier>.pdf` files (relative to the working directory).
    pub output_dir: PathBuf,
    #[serde(default)]
    pub browser: BrowserSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            browser: BrowserSettings::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_NAME)?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AppConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let default_cfg = AppConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&data)?;
    Ok(cfg)
}
