//! Configuration for the meter poller.

use meterpoll_common::{Error, LoggingConfig, ServiceConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::registers::{RegisterDescriptor, RegisterTable, TableError};

/// Complete poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterPollConfig {
    /// Meter connection settings
    pub meter: MeterConfig,

    /// Poll timing
    #[serde(default)]
    pub polling: PollingConfig,

    /// Snapshot output
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Register table (built-in UPM209 single-phase table when empty)
    #[serde(default)]
    pub registers: Vec<RegisterDescriptor>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Meter (Modbus slave) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Serial line settings
    pub serial: SerialConfig,

    /// Modbus slave address (1-247)
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_slave_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

/// Serial line settings for the RS-485 adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
    pub port: String,
    /// Baud rate (default: 19200)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Data bits (default: 8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Parity: "none", "even", or "odd" (default: "none")
    #[serde(default = "default_parity")]
    pub parity: String,
    /// Stop bits: 1 or 2 (default: 1)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

fn default_baud_rate() -> u32 {
    19200
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "none".to_string()
}

fn default_stop_bits() -> u8 {
    1
}

/// Poll timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Bus settle time between two register reads, in milliseconds
    #[serde(default = "default_register_delay_ms")]
    pub register_delay_ms: u64,

    /// Pause between the end of a cycle and the start of the next, in milliseconds
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
}

fn default_register_delay_ms() -> u64 {
    500
}

fn default_cycle_interval_ms() -> u64 {
    5000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            register_delay_ms: default_register_delay_ms(),
            cycle_interval_ms: default_cycle_interval_ms(),
        }
    }
}

impl PollingConfig {
    pub fn register_delay(&self) -> Duration {
        Duration::from_millis(self.register_delay_ms)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

/// Snapshot output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Snapshot file, replaced every cycle
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,

    /// Optional file receiving the poller health after every cycle
    #[serde(default)]
    pub status_path: Option<PathBuf>,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data_monofase.json")
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
            status_path: None,
        }
    }
}

impl MeterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl MeterPollConfig {
    /// Build the register table to poll.
    pub fn register_table(&self) -> Result<RegisterTable, TableError> {
        if self.registers.is_empty() {
            RegisterTable::upm209_single_phase()
        } else {
            RegisterTable::new(self.registers.clone())
        }
    }
}

impl ServiceConfig for MeterPollConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> meterpoll_common::Result<()> {
        let meter = &self.meter;

        if !(1..=247).contains(&meter.slave_id) {
            return Err(Error::validation(format!(
                "slave_id must be 1-247 (got {})",
                meter.slave_id
            )));
        }

        if meter.timeout_ms == 0 {
            return Err(Error::validation("timeout_ms must be greater than 0"));
        }

        let serial = &meter.serial;
        if serial.port.trim().is_empty() {
            return Err(Error::validation("Serial port cannot be empty"));
        }

        if serial.baud_rate == 0 {
            return Err(Error::validation("baud_rate must be greater than 0"));
        }

        match serial.parity.to_lowercase().as_str() {
            "none" | "even" | "odd" => {}
            _ => {
                return Err(Error::validation(format!(
                    "invalid parity '{}' (use none, even, or odd)",
                    serial.parity
                )));
            }
        }

        if !(5..=8).contains(&serial.data_bits) {
            return Err(Error::validation(format!(
                "data_bits must be 5-8 (got {})",
                serial.data_bits
            )));
        }

        if !matches!(serial.stop_bits, 1 | 2) {
            return Err(Error::validation(format!(
                "stop_bits must be 1 or 2 (got {})",
                serial.stop_bits
            )));
        }

        if self.polling.cycle_interval_ms == 0 {
            return Err(Error::validation(
                "cycle_interval_ms must be greater than 0",
            ));
        }

        self.register_table()
            .map_err(|e| Error::validation(e.to_string()))?;

        Ok(())
    }
}
