//! Modbus RTU energy-meter poller.
//!
//! Polls a fixed table of meter registers over Modbus RTU, reassembles
//! multi-word values into scaled quantities and persists them as a single
//! JSON snapshot, replaced every cycle.
//!
//! # Snapshot format
//!
//! ```text
//! {"<register name>":{"value":<number>,"unit":"<unit>"},...}
//! ```
//!
//! Keys follow the order of the register table.

pub mod config;
pub mod decode;
pub mod document;
pub mod poller;
pub mod registers;
pub mod scheduler;
pub mod snapshot;
pub mod transport;

pub use config::MeterPollConfig;
pub use decode::{ScaledValue, decode_words};
pub use document::{Document, Measurement};
pub use poller::{PollOutcome, RegisterPoller};
pub use registers::{RegisterDescriptor, RegisterTable, RegisterType, WordCount};
pub use scheduler::CycleScheduler;
pub use snapshot::SnapshotWriter;
pub use transport::{ReadRequest, RegisterTransport, RtuTransport, TransportError};
