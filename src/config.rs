use crate::clock::ClockKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub clock: ClockSettings,
    #[serde(default)]
    pub volume: VolumeSettings,
    #[serde(default)]
    pub cover: CoverSettings,
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: Option<TlsPaths>,
    /// Topic root the player publishes under; subtopics are appended.
    #[serde(default = "default_topic_root")]
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsPaths {
    pub ca_certs_path: String,
    pub certfile_path: Option<String>,
    pub keyfile_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_display_host")]
    pub host: String,
    #[serde(default = "default_display_port")]
    pub port: u16,
    #[serde(default = "default_display_dim")]
    pub width: u32,
    #[serde(default = "default_display_dim")]
    pub height: u32,
    #[serde(default)]
    pub layer: u32,
    /// When true, black pixels stay black and show the compositing layer
    /// below instead of being nudged to (1,1,1).
    #[serde(default)]
    pub transparent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "type", default)]
    pub kind: ClockKind,
    #[serde(default = "default_clock_start")]
    pub start: String,
    #[serde(default = "default_clock_end")]
    pub end: String,
    #[serde(default = "default_secondary_priority")]
    pub priority: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSettings {
    /// Seconds the bar stays up after the last update.
    #[serde(default = "default_volume_timeout")]
    pub timeout: f32,
    #[serde(default = "default_bar_width")]
    pub bar_width: u32,
    #[serde(default)]
    pub priority: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverSettings {
    #[serde(default)]
    pub priority: u8,
}

fn default_mqtt_host() -> String {
    "localhost".into()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_topic_root() -> String {
    "shairport-sync".into()
}

fn default_display_host() -> String {
    "localhost".into()
}

fn default_display_port() -> u16 {
    1337
}

fn default_display_dim() -> u32 {
    64
}

fn default_true() -> bool {
    true
}

fn default_clock_start() -> String {
    "08:00".into()
}

fn default_clock_end() -> String {
    "18:00".into()
}

fn default_secondary_priority() -> u8 {
    1
}

fn default_volume_timeout() -> f32 {
    5.0
}

fn default_bar_width() -> u32 {
    4
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            tls: None,
            topic: default_topic_root(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            host: default_display_host(),
            port: default_display_port(),
            width: default_display_dim(),
            height: default_display_dim(),
            layer: 0,
            transparent: false,
        }
    }
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: ClockKind::default(),
            start: default_clock_start(),
            end: default_clock_end(),
            priority: default_secondary_priority(),
        }
    }
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            timeout: default_volume_timeout(),
            bar_width: default_bar_width(),
            priority: 0,
        }
    }
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self { priority: 0 }
    }
}

impl Config {
    /// Load the config file; a missing or empty file yields defaults, a
    /// malformed one is an error (it would silently misconfigure the broker
    /// connection otherwise).
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
