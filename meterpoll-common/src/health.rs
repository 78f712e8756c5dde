//! Poll cycle health tracking.
//!
//! This module provides:
//! - [`PollerHealth`] for accumulating counters across poll cycles
//! - [`CycleReport`] describing the outcome of a single cycle
//! - [`HealthSnapshot`] for logging and serialization

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Overall health derived from the most recent cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every register was read and the snapshot was persisted.
    Healthy,
    /// Some registers failed but a snapshot was persisted.
    Degraded,
    /// Nothing was read or the snapshot could not be persisted.
    Error,
    /// No cycle has completed yet.
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Error => write!(f, "error"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of a single poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Registers in the table.
    pub registers_total: usize,
    /// Registers read and decoded successfully.
    pub registers_read: usize,
    /// Names of the registers that failed this cycle.
    pub failed: Vec<String>,
    /// Whether the snapshot was written.
    pub persisted: bool,
    /// Wall time spent on the cycle, in milliseconds.
    pub duration_ms: u64,
}

impl CycleReport {
    /// Number of registers that failed this cycle.
    pub fn registers_failed(&self) -> usize {
        self.failed.len()
    }

    /// Health of this cycle taken on its own.
    pub fn status(&self) -> HealthStatus {
        if !self.persisted || (self.registers_total > 0 && self.registers_read == 0) {
            HealthStatus::Error
        } else if self.failed.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }
}

/// Health snapshot for logging and serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Service name.
    pub service: String,
    /// Overall health status.
    pub status: HealthStatus,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Completed poll cycles.
    pub cycles_completed: u64,
    /// Successful register reads since start.
    pub registers_read: u64,
    /// Failed register reads since start.
    pub registers_failed: u64,
    /// Snapshots written since start.
    pub snapshots_written: u64,
    /// Snapshot writes that failed since start.
    pub snapshots_failed: u64,
    /// Storage preparation failures since start.
    pub storage_failures: u64,
    /// Last cycle duration in milliseconds.
    pub last_cycle_duration_ms: u64,
    /// Last cycle completion (millis since epoch), 0 if none.
    pub last_cycle_at: i64,
}

/// Accumulated poller health.
///
/// All counters are atomics so a shared `Arc<PollerHealth>` can be read
/// while the scheduler keeps updating it.
#[derive(Debug)]
pub struct PollerHealth {
    service: String,
    start_time: Instant,
    cycles_completed: AtomicU64,
    registers_read: AtomicU64,
    registers_failed: AtomicU64,
    snapshots_written: AtomicU64,
    snapshots_failed: AtomicU64,
    storage_failures: AtomicU64,
    last_cycle_duration_ms: AtomicU64,
    last_cycle_at: AtomicI64,
    last_registers_total: AtomicU64,
    last_registers_read: AtomicU64,
    last_persisted: AtomicBool,
}

impl PollerHealth {
    /// Create a new health tracker.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            start_time: Instant::now(),
            cycles_completed: AtomicU64::new(0),
            registers_read: AtomicU64::new(0),
            registers_failed: AtomicU64::new(0),
            snapshots_written: AtomicU64::new(0),
            snapshots_failed: AtomicU64::new(0),
            storage_failures: AtomicU64::new(0),
            last_cycle_duration_ms: AtomicU64::new(0),
            last_cycle_at: AtomicI64::new(0),
            last_registers_total: AtomicU64::new(0),
            last_registers_read: AtomicU64::new(0),
            last_persisted: AtomicBool::new(false),
        }
    }

    /// Record the outcome of a completed cycle.
    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        self.registers_read
            .fetch_add(report.registers_read as u64, Ordering::SeqCst);
        self.registers_failed
            .fetch_add(report.registers_failed() as u64, Ordering::SeqCst);

        if report.persisted {
            self.snapshots_written.fetch_add(1, Ordering::SeqCst);
        } else {
            self.snapshots_failed.fetch_add(1, Ordering::SeqCst);
        }

        self.last_cycle_duration_ms
            .store(report.duration_ms, Ordering::SeqCst);
        self.last_cycle_at
            .store(chrono::Utc::now().timestamp_millis(), Ordering::SeqCst);
        self.last_registers_total
            .store(report.registers_total as u64, Ordering::SeqCst);
        self.last_registers_read
            .store(report.registers_read as u64, Ordering::SeqCst);
        self.last_persisted.store(report.persisted, Ordering::SeqCst);
    }

    /// Record that the snapshot storage could not be prepared.
    pub fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Status derived from the most recent cycle.
    pub fn status(&self) -> HealthStatus {
        if self.cycles_completed.load(Ordering::SeqCst) == 0 {
            return HealthStatus::Unknown;
        }

        let total = self.last_registers_total.load(Ordering::SeqCst);
        let read = self.last_registers_read.load(Ordering::SeqCst);
        let persisted = self.last_persisted.load(Ordering::SeqCst);

        if !persisted || (total > 0 && read == 0) {
            HealthStatus::Error
        } else if read < total {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Time since the tracker was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get a snapshot of current health metrics.
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            service: self.service.clone(),
            status: self.status(),
            uptime_secs: self.uptime().as_secs(),
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            registers_read: self.registers_read.load(Ordering::SeqCst),
            registers_failed: self.registers_failed.load(Ordering::SeqCst),
            snapshots_written: self.snapshots_written.load(Ordering::SeqCst),
            snapshots_failed: self.snapshots_failed.load(Ordering::SeqCst),
            storage_failures: self.storage_failures.load(Ordering::SeqCst),
            last_cycle_duration_ms: self.last_cycle_duration_ms.load(Ordering::SeqCst),
            last_cycle_at: self.last_cycle_at.load(Ordering::SeqCst),
        }
    }
}
