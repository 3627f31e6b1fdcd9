use log::{info, warn};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

pub const DATA_DIR_ENV: &str = "NOTEKEEPER_HOME";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_true")]
    pub show_greeting: bool,
    #[serde(default = "default_true")]
    pub sidebar_visible: bool,
    /// Characters of note text shown on a card before it is cut off.
    #[serde(default = "default_preview_chars")]
    pub card_preview_chars: usize,
    /// How often the clock and the "min ago" labels are refreshed.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_preview_chars() -> usize {
    60
}

fn default_tick_seconds() -> u64 {
    30
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            show_greeting: true,
            sidebar_visible: true,
            card_preview_chars: default_preview_chars(),
            tick_seconds: default_tick_seconds(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThemeConfig {
    pub background: Color,
    pub foreground: Color,
    pub border_active: Color,
    pub border_inactive: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub active_notebook: Color,
    pub header: Color,
    pub greeting: Color,
    pub muted: Color,
    pub disabled: Color,
    pub danger: Color,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            background: Color::Reset,
            foreground: Color::Rgb(248, 248, 242),
            border_active: Color::Rgb(255, 121, 198),
            border_inactive: Color::Rgb(98, 114, 164),
            selection_bg: Color::Rgb(68, 71, 90),
            selection_fg: Color::Rgb(255, 121, 198),
            active_notebook: Color::Rgb(80, 250, 123),
            header: Color::Rgb(255, 121, 198),
            greeting: Color::Rgb(189, 147, 249),
            muted: Color::DarkGray,
            disabled: Color::Rgb(98, 114, 164),
            danger: Color::Rgb(255, 85, 85),
        }
    }
}

/// Resolves the directory holding the database, config and logs.
///
/// An explicit path wins, then `$NOTEKEEPER_HOME`, then `~/.notekeeper`.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".notekeeper");
    path
}

fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())
}

pub fn load_config(data_dir: &Path) -> AppConfig {
    fs::create_dir_all(data_dir).ok();
    let path = data_dir.join(CONFIG_FILE);

    if !path.exists() {
        let default_config = AppConfig::default();
        if let Ok(toml_str) = toml::to_string_pretty(&default_config) {
            match write_private(&path, &toml_str) {
                Ok(()) => info!("Wrote default config to {:?}", path),
                Err(e) => warn!("Failed to write default config: {}", e),
            }
        }
        return default_config;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse {}: {}", CONFIG_FILE, e);
                let backup_path = path.with_extension("toml.bak");
                if let Err(backup_err) = fs::rename(&path, &backup_path) {
                    warn!("Failed to backup corrupted config: {}", backup_err);
                } else {
                    warn!("Corrupted config backed up to {:?}", backup_path);
                }
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config file: {}. Using default.", e);
            AppConfig::default()
        }
    }
}

pub fn save_config(data_dir: &Path, config: &AppConfig) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;
    let toml_str = toml::to_string_pretty(config)?;
    write_private(&data_dir.join(CONFIG_FILE), &toml_str)?;
    Ok(())
}
