//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::device::{PROC_DEVICES, PROC_MISC, SYSFS_CLASS, SYSFS_ROOT};
use crate::port::{
    BitRate, CharSize, Parity, PortSettings, Rs485Settings, StopBits, TermiosSettings,
    DEFAULT_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Line settings
    pub serial: SerialConfig,
    /// RS-485 driver-enable settings
    pub rs485: Rs485Config,
    /// Where device identity is read from
    pub device: DeviceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Everything `Port::open_with` needs.
    pub fn port_settings(&self) -> ConfigResult<PortSettings> {
        let mut settings = self.serial.to_settings()?;
        settings.rs485 = self.rs485.to_settings();
        Ok(settings)
    }
}

/// Serial line configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device node opened when none is given on the command line
    pub device: Option<PathBuf>,
    pub baud: u32,
    pub data_bits: u8,
    /// "none", "odd", "even", "mark" or "space"
    pub parity: String,
    pub stop_bits: u8,
    pub xonxoff: bool,
    pub rtscts: bool,
    pub dsrdtr: bool,
    /// Check for an exclusive lock at open
    pub exclusive: bool,
    /// VTIME gap in milliseconds; 0 disables it
    pub inter_byte_timeout_ms: u64,
    /// Per-call read/write deadline; 0 blocks indefinitely
    pub timeout_ms: u64,
    pub low_latency: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud: 9600,
            data_bits: 8,
            parity: "none".to_string(),
            stop_bits: 1,
            xonxoff: false,
            rtscts: false,
            dsrdtr: false,
            exclusive: true,
            inter_byte_timeout_ms: 0,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            low_latency: false,
        }
    }
}

impl SerialConfig {
    /// Per-call deadline, `None` meaning no deadline.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Validate and convert into port settings (RS-485 left disabled).
    pub fn to_settings(&self) -> ConfigResult<PortSettings> {
        let speed = BitRate::from_baud(self.baud)
            .map_err(|e| ConfigError::setting("serial.baud", e.to_string()))?;
        let char_size = CharSize::try_from(self.data_bits)
            .map_err(|e| ConfigError::setting("serial.data_bits", e.to_string()))?;
        let parity: Parity = self
            .parity
            .parse()
            .map_err(|e: crate::port::PortError| ConfigError::setting("serial.parity", e.to_string()))?;
        let stop_bits = StopBits::try_from(self.stop_bits)
            .map_err(|e| ConfigError::setting("serial.stop_bits", e.to_string()))?;

        Ok(PortSettings {
            termios: TermiosSettings {
                speed,
                char_size,
                parity,
                stop_bits,
                xonxoff: self.xonxoff,
                rtscts: self.rtscts,
                inter_byte_timeout: (self.inter_byte_timeout_ms > 0)
                    .then(|| Duration::from_millis(self.inter_byte_timeout_ms)),
            },
            dsrdtr: self.dsrdtr,
            exclusive: self.exclusive,
            low_latency: self.low_latency,
            rs485: Rs485Settings::default(),
        })
    }
}

/// RS-485 configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rs485Config {
    pub enabled: bool,
    pub loopback: bool,
    pub rts_level_for_tx: bool,
    pub rts_level_for_rx: bool,
    pub delay_before_tx_ms: Option<u64>,
    pub delay_before_rx_ms: Option<u64>,
}

impl Rs485Config {
    pub fn to_settings(&self) -> Rs485Settings {
        Rs485Settings {
            enabled: self.enabled,
            loopback: self.loopback,
            rts_level_for_tx: self.rts_level_for_tx,
            rts_level_for_rx: self.rts_level_for_rx,
            delay_before_tx: self.delay_before_tx_ms.map(Duration::from_millis),
            delay_before_rx: self.delay_before_rx_ms.map(Duration::from_millis),
        }
    }
}

/// Device identity sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub proc_devices: PathBuf,
    pub proc_misc: PathBuf,
    pub sysfs_root: PathBuf,
    /// Class directory searched under `<sysfs_root>/class`
    pub sysfs_class: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            proc_devices: PathBuf::from(PROC_DEVICES),
            proc_misc: PathBuf::from(PROC_MISC),
            sysfs_root: PathBuf::from(SYSFS_ROOT),
            sysfs_class: SYSFS_CLASS.to_string(),
        }
    }
}

impl DeviceConfig {
    pub fn class_sources(&self) -> Vec<PathBuf> {
        vec![self.proc_devices.clone(), self.proc_misc.clone()]
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}
