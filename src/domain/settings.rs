use crate::domain::session::DEFAULT_WINDOW;
use crate::infrastructure::bluetooth::protocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
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
    "ble_sensor_lab".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Device
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    // GATT characteristics
    #[serde(default = "default_led_uuid")]
    pub led_char_uuid: String,
    #[serde(default = "default_accel_uuid")]
    pub accel_char_uuid: String,
    #[serde(default = "default_gyro_uuid")]
    pub gyro_char_uuid: String,

    // LED loop
    #[serde(default = "default_led_iterations")]
    pub led_iterations: u32,
    #[serde(default = "default_led_interval_ms")]
    pub led_interval_ms: u64,

    // Bus
    #[serde(default = "default_bus_url")]
    pub bus_url: String,

    // GUI
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_plot_window")]
    pub plot_window: usize,
    #[serde(default)]
    pub auto_stop_secs: Option<f64>,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            scan_timeout_secs: default_scan_timeout_secs(),
            led_char_uuid: default_led_uuid(),
            accel_char_uuid: default_accel_uuid(),
            gyro_char_uuid: default_gyro_uuid(),
            led_iterations: default_led_iterations(),
            led_interval_ms: default_led_interval_ms(),
            bus_url: default_bus_url(),
            poll_interval_ms: default_poll_interval_ms(),
            plot_window: default_plot_window(),
            auto_stop_secs: None,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_device_name() -> String {
    protocol::DEFAULT_DEVICE_NAME.to_string()
}
fn default_scan_timeout_secs() -> u64 {
    5
}
fn default_led_uuid() -> String {
    protocol::LED_CHAR_UUID.to_string()
}
fn default_accel_uuid() -> String {
    protocol::ACCEL_CHAR_UUID.to_string()
}
fn default_gyro_uuid() -> String {
    protocol::GYRO_CHAR_UUID.to_string()
}
fn default_led_iterations() -> u32 {
    10
}
fn default_led_interval_ms() -> u64 {
    1000
}
fn default_bus_url() -> String {
    "tcp://127.0.0.1:5555".to_string()
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_plot_window() -> usize {
    DEFAULT_WINDOW
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Loads settings from `path`, or from the per-user config directory when `None`.
    /// A missing or unreadable file yields defaults.
    pub fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let settings_path = match path {
            Some(path) => path,
            None => Self::default_settings_path()?,
        };
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn default_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("BleSensorLab");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
