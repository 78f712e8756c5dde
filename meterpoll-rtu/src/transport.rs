//! Register read transport.
//!
//! The poller only needs "read N words from this address"; framing, CRC and
//! serial timing are handled by `tokio-modbus`.

use async_trait::async_trait;
use std::time::Duration;
use tokio_modbus::client::{Context, Reader};
use tokio_modbus::prelude::*;
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::registers::{RegisterDescriptor, RegisterType};

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Read failed: {0}")]
    Read(String),
    #[error("Exception: {0}")]
    Exception(String),
    #[error("Unexpected response length: expected {expected} words, got {actual}")]
    ResponseLength { expected: usize, actual: usize },
}

/// A single register read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    /// Slave (unit) address on the bus
    pub slave: u8,
    /// Register class, selects function code 0x03 or 0x04
    pub register_type: RegisterType,
    /// Start address
    pub address: u16,
    /// Number of 16-bit words
    pub count: u16,
}

impl ReadRequest {
    /// Build the request that reads `register` from `slave`.
    pub fn for_register(slave: u8, register: &RegisterDescriptor) -> Self {
        Self {
            slave,
            register_type: register.register_type,
            address: register.address,
            count: register.count.words(),
        }
    }

    /// Modbus function code of this request.
    pub fn function_code(&self) -> u8 {
        self.register_type.function_code()
    }
}

/// Blocking-style register reader. One request is outstanding at a time.
#[async_trait]
pub trait RegisterTransport: Send {
    /// Read `request.count` words, or fail.
    async fn read(&mut self, request: ReadRequest) -> Result<Vec<u16>, TransportError>;
}

/// Modbus RTU transport over a serial port.
pub struct RtuTransport {
    ctx: Context,
    timeout: Duration,
}

impl RtuTransport {
    /// Open the serial port and attach a Modbus RTU client to it.
    pub fn open(
        serial: &SerialConfig,
        slave: u8,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let parity = match serial.parity.to_lowercase().as_str() {
            "none" => tokio_serial::Parity::None,
            "even" => tokio_serial::Parity::Even,
            "odd" => tokio_serial::Parity::Odd,
            other => {
                return Err(TransportError::Connection(format!(
                    "Invalid parity '{}'",
                    other
                )));
            }
        };

        let stop_bits = match serial.stop_bits {
            1 => tokio_serial::StopBits::One,
            2 => tokio_serial::StopBits::Two,
            other => {
                return Err(TransportError::Connection(format!(
                    "Invalid stop bits {}",
                    other
                )));
            }
        };

        let data_bits = match serial.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            8 => tokio_serial::DataBits::Eight,
            other => {
                return Err(TransportError::Connection(format!(
                    "Invalid data bits {}",
                    other
                )));
            }
        };

        let builder = tokio_serial::new(&serial.port, serial.baud_rate)
            .parity(parity)
            .stop_bits(stop_bits)
            .data_bits(data_bits);

        let stream = tokio_serial::SerialStream::open(&builder)
            .map_err(|e| TransportError::Connection(format!("Serial open failed: {}", e)))?;

        info!(
            port = %serial.port,
            baud_rate = serial.baud_rate,
            parity = %serial.parity,
            "Modbus RTU master initialized"
        );

        Ok(Self {
            ctx: rtu::attach_slave(stream, Slave(slave)),
            timeout,
        })
    }
}

#[async_trait]
impl RegisterTransport for RtuTransport {
    async fn read(&mut self, request: ReadRequest) -> Result<Vec<u16>, TransportError> {
        self.ctx.set_slave(Slave(request.slave));

        debug!(
            slave = request.slave,
            function = request.function_code(),
            address = request.address,
            count = request.count,
            "Sending read request"
        );

        let response = match request.register_type {
            RegisterType::Holding => {
                tokio::time::timeout(
                    self.timeout,
                    self.ctx.read_holding_registers(request.address, request.count),
                )
                .await
            }
            RegisterType::Input => {
                tokio::time::timeout(
                    self.timeout,
                    self.ctx.read_input_registers(request.address, request.count),
                )
                .await
            }
        };

        let words = response
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|e| TransportError::Read(e.to_string()))?
            .map_err(|e| TransportError::Exception(format!("{:?}", e)))?;

        if words.len() != usize::from(request.count) {
            return Err(TransportError::ResponseLength {
                expected: usize::from(request.count),
                actual: words.len(),
            });
        }

        Ok(words)
    }
}
