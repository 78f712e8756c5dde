//! Register polling.
//!
//! One cycle walks the register table in order, issuing exactly one request
//! at a time. A failed register is logged and left out of the document; it
//! never aborts the cycle.

use std::time::Duration;
use tracing::{debug, warn};

use crate::decode::{DecodeError, decode_words};
use crate::document::{Document, Measurement};
use crate::registers::{RegisterDescriptor, RegisterTable};
use crate::transport::{ReadRequest, RegisterTransport, TransportError};

/// Error type for a single register read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PollerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// A register that could not be read this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterFailure {
    pub name: String,
    pub address: u16,
    pub error: PollerError,
}

/// Result of one pass over the register table.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    pub document: Document,
    pub failures: Vec<RegisterFailure>,
}

/// Polls the register table of one meter.
pub struct RegisterPoller<T> {
    transport: T,
    table: RegisterTable,
    slave: u8,
    register_delay: Duration,
}

impl<T: RegisterTransport> RegisterPoller<T> {
    /// Create a new poller.
    pub fn new(transport: T, table: RegisterTable, slave: u8, register_delay: Duration) -> Self {
        Self {
            transport,
            table,
            slave,
            register_delay,
        }
    }

    pub fn table(&self) -> &RegisterTable {
        &self.table
    }

    /// Perform a single poll cycle.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        for register in self.table.iter() {
            match read_register(&mut self.transport, self.slave, register).await {
                Ok(measurement) => {
                    debug!(
                        register = %register.name,
                        value = %measurement.value,
                        unit = %measurement.unit,
                        "Register read"
                    );
                    outcome.document.insert(register.name.clone(), measurement);
                }
                Err(error) => {
                    warn!(
                        register = %register.name,
                        kind = register.register_type.as_str(),
                        address = register.address,
                        error = %error,
                        "Failed to read register"
                    );
                    outcome.failures.push(RegisterFailure {
                        name: register.name.clone(),
                        address: register.address,
                        error,
                    });
                }
            }

            if !self.register_delay.is_zero() {
                tokio::time::sleep(self.register_delay).await;
            }
        }

        outcome
    }
}

/// Read and decode one register.
async fn read_register<T: RegisterTransport>(
    transport: &mut T,
    slave: u8,
    register: &RegisterDescriptor,
) -> Result<Measurement, PollerError> {
    let words = transport
        .read(ReadRequest::for_register(slave, register))
        .await?;
    let value = decode_words(&words, register.count, register.scale)?;
    Ok(Measurement::new(value, register.unit.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ScaledValue;
    use crate::registers::{RegisterType, WordCount};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Transport answering from a fixed address map and recording requests.
    #[derive(Default)]
    struct MapTransport {
        responses: HashMap<u16, Result<Vec<u16>, TransportError>>,
        requests: Vec<ReadRequest>,
    }

    #[async_trait]
    impl RegisterTransport for MapTransport {
        async fn read(&mut self, request: ReadRequest) -> Result<Vec<u16>, TransportError> {
            self.requests.push(request);
            self.responses
                .get(&request.address)
                .cloned()
                .unwrap_or(Err(TransportError::Timeout(Duration::from_millis(1000))))
        }
    }

    fn table() -> RegisterTable {
        RegisterTable::new(vec![
            RegisterDescriptor::new("Voltage", "V", 0, WordCount::Two, RegisterType::Input, 0.001),
            RegisterDescriptor::new("Status", "", 0x10, WordCount::One, RegisterType::Holding, 1.0),
            RegisterDescriptor::new(
                "Energy",
                "kWh",
                0x0400,
                WordCount::Four,
                RegisterType::Input,
                0.0001,
            ),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_poll_all_registers() {
        let mut transport = MapTransport::default();
        transport.responses.insert(0x0000, Ok(vec![0x0001, 0x86A0]));
        transport.responses.insert(0x0010, Ok(vec![7]));
        transport.responses.insert(0x0400, Ok(vec![0, 0, 0, 0x2710]));

        let mut poller = RegisterPoller::new(transport, table(), 1, Duration::ZERO);
        let outcome = poller.poll_once().await;

        assert!(outcome.failures.is_empty());
        let names: Vec<_> = outcome.document.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Voltage", "Status", "Energy"]);

        let voltage = outcome.document.get("Voltage").unwrap();
        assert!((voltage.value.as_f64() - 100.0).abs() < 1e-4);
        assert_eq!(voltage.unit, "V");
        assert_eq!(
            outcome.document.get("Status").unwrap().value,
            ScaledValue::Single(7.0)
        );
        assert!(matches!(
            outcome.document.get("Energy").unwrap().value,
            ScaledValue::Double(v) if (v - 1.0).abs() < 1e-12
        ));
    }

    #[tokio::test]
    async fn test_requests_follow_descriptors() {
        let mut poller = RegisterPoller::new(MapTransport::default(), table(), 9, Duration::ZERO);
        poller.poll_once().await;

        let requests = &poller.transport.requests;
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].slave, 9);
        assert_eq!(requests[0].function_code(), 0x04);
        assert_eq!(requests[0].count, 2);
        assert_eq!(requests[1].function_code(), 0x03);
        assert_eq!(requests[1].count, 1);
        assert_eq!(requests[2].address, 0x0400);
        assert_eq!(requests[2].count, 4);
    }

    #[tokio::test]
    async fn test_failed_register_is_skipped() {
        let mut transport = MapTransport::default();
        transport.responses.insert(0x0000, Ok(vec![0x0001, 0x86A0]));
        transport.responses.insert(
            0x0010,
            Err(TransportError::Exception("IllegalDataAddress".to_string())),
        );
        transport.responses.insert(0x0400, Ok(vec![0, 0, 0, 0x2710]));

        let mut poller = RegisterPoller::new(transport, table(), 1, Duration::ZERO);
        let outcome = poller.poll_once().await;

        assert_eq!(outcome.document.len(), 2);
        assert!(!outcome.document.contains("Status"));
        assert!(outcome.document.contains("Voltage"));
        assert!(outcome.document.contains("Energy"));

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].name, "Status");
        assert_eq!(outcome.failures[0].address, 0x0010);
        assert!(matches!(
            outcome.failures[0].error,
            PollerError::Transport(TransportError::Exception(_))
        ));
    }

    #[tokio::test]
    async fn test_short_response_is_decode_failure() {
        let mut transport = MapTransport::default();
        transport.responses.insert(0x0000, Ok(vec![0x0001]));

        let mut poller = RegisterPoller::new(transport, table(), 1, Duration::ZERO);
        let outcome = poller.poll_once().await;

        let failure = outcome.failures.iter().find(|f| f.name == "Voltage").unwrap();
        assert_eq!(
            failure.error,
            PollerError::Decode(DecodeError::Length {
                expected: 2,
                actual: 1
            })
        );
    }

    #[tokio::test]
    async fn test_overflowing_value_is_skipped() {
        let table = RegisterTable::new(vec![
            RegisterDescriptor::new("Huge", "V", 0, WordCount::Two, RegisterType::Input, 1e30),
            RegisterDescriptor::new("Status", "", 0x10, WordCount::One, RegisterType::Holding, 1.0),
        ])
        .unwrap();
        let mut transport = MapTransport::default();
        transport.responses.insert(0x0000, Ok(vec![0xFFFF, 0xFFFF]));
        transport.responses.insert(0x0010, Ok(vec![7]));

        let mut poller = RegisterPoller::new(transport, table, 1, Duration::ZERO);
        let outcome = poller.poll_once().await;

        assert!(matches!(
            outcome.failures[0].error,
            PollerError::Decode(DecodeError::NotFinite(_))
        ));
        assert_eq!(
            outcome.document.to_json().unwrap(),
            r#"{"Status":{"value":7.0,"unit":""}}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_delay_applies_after_every_register() {
        let delay = Duration::from_millis(500);
        let mut poller = RegisterPoller::new(MapTransport::default(), table(), 1, delay);

        let start = tokio::time::Instant::now();
        let outcome = poller.poll_once().await;

        // Delay is applied even when every read fails
        assert_eq!(outcome.failures.len(), 3);
        assert_eq!(start.elapsed(), delay * 3);
    }
}
