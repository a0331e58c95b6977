use crate::domain::models::PointerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            ansi_colors: default_true(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "gearvr_bridge".to_string()
}

/// Radio-stack parameters handed to `RadioStack::init` and the tick driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioSettings {
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u16,
    #[serde(default = "default_scan_window")]
    pub scan_window: u16,
    #[serde(default = "default_true")]
    pub active_scan: bool,
    #[serde(default = "default_tx_power")]
    pub tx_power_dbm: i8,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            scan_interval: default_scan_interval(),
            scan_window: default_scan_window(),
            active_scan: true,
            tx_power_dbm: default_tx_power(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_scan_interval() -> u16 {
    1349
}
fn default_scan_window() -> u16 {
    449
}
fn default_tx_power() -> i8 {
    9
}
fn default_tick_ms() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointerSettings {
    #[serde(default = "default_screen_distance")]
    pub screen_distance: f32,
    #[serde(default = "default_screen_width")]
    pub screen_width: f32,
    #[serde(default = "default_screen_height")]
    pub screen_height: f32,
    #[serde(default = "default_pixel_range")]
    pub pixel_range: f32,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            screen_distance: default_screen_distance(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            pixel_range: default_pixel_range(),
        }
    }
}

impl From<&PointerSettings> for PointerConfig {
    fn from(s: &PointerSettings) -> Self {
        Self {
            screen_distance: s.screen_distance,
            screen_width: s.screen_width,
            screen_height: s.screen_height,
            pixel_range: s.pixel_range,
        }
    }
}

fn default_screen_distance() -> f32 {
    0.5
}
fn default_screen_width() -> f32 {
    0.6
}
fn default_screen_height() -> f32 {
    0.35
}
fn default_pixel_range() -> f32 {
    500.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub radio: RadioSettings,
    #[serde(default)]
    pub pointer: PointerSettings,
}

pub struct SettingsService {
    settings: BridgeSettings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("gearvr-bridge");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<BridgeSettings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut BridgeSettings {
        &mut self.settings
    }
}
