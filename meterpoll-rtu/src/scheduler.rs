//! Fixed-period cycle scheduling.

use meterpoll_common::{CycleReport, PollerHealth};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::poller::RegisterPoller;
use crate::snapshot::{SnapshotWriter, parse_snapshot, write_json_atomic};
use crate::transport::RegisterTransport;

/// Runs poll + persist back to back, then waits for the next cycle.
pub struct CycleScheduler<T> {
    poller: RegisterPoller<T>,
    writer: SnapshotWriter,
    status_path: Option<PathBuf>,
    cycle_interval: Duration,
    health: Arc<PollerHealth>,
    storage_ready: bool,
}

impl<T: RegisterTransport> CycleScheduler<T> {
    pub fn new(
        poller: RegisterPoller<T>,
        writer: SnapshotWriter,
        cycle_interval: Duration,
        health: Arc<PollerHealth>,
    ) -> Self {
        Self {
            poller,
            writer,
            status_path: None,
            cycle_interval,
            health,
            storage_ready: false,
        }
    }

    /// Also write the health snapshot to `path` after every cycle.
    pub fn with_status_path(mut self, path: Option<PathBuf>) -> Self {
        self.status_path = path;
        self
    }

    pub fn health(&self) -> &Arc<PollerHealth> {
        &self.health
    }

    /// Prepare storage and surface the previous snapshot.
    ///
    /// Returns the raw content of the previous snapshot, if one was found.
    pub async fn startup(&mut self) -> Option<String> {
        self.ensure_storage().await;

        match self.writer.read_back().await {
            Ok(Some(content)) => {
                info!(
                    path = %self.writer.path().display(),
                    content = %content,
                    "Previous snapshot"
                );
                match parse_snapshot(&content) {
                    Ok(entries) => debug!(entries = entries.len(), "Previous snapshot parsed"),
                    Err(e) => warn!(error = %e, "Previous snapshot is not valid JSON"),
                }
                Some(content)
            }
            Ok(None) => {
                info!(path = %self.writer.path().display(), "No previous snapshot");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read previous snapshot");
                None
            }
        }
    }

    /// Run one poll cycle and persist its document.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();

        if !self.storage_ready {
            self.ensure_storage().await;
        }

        let outcome = self.poller.poll_once().await;

        let persisted = match self.writer.write(&outcome.document).await {
            Ok(bytes) => {
                debug!(
                    path = %self.writer.path().display(),
                    bytes,
                    "Snapshot saved"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to save snapshot");
                false
            }
        };

        let report = CycleReport {
            registers_total: self.poller.table().len(),
            registers_read: outcome.document.len(),
            failed: outcome.failures.into_iter().map(|f| f.name).collect(),
            persisted,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        self.health.record_cycle(&report);

        info!(
            read = report.registers_read,
            failed = report.registers_failed(),
            persisted = report.persisted,
            duration_ms = report.duration_ms,
            status = %report.status(),
            "Poll cycle complete"
        );

        if let Some(path) = &self.status_path {
            if let Err(e) = write_json_atomic(path, &self.health.snapshot()).await {
                warn!(error = %e, "Failed to write status file");
            }
        }

        report
    }

    /// Run cycles forever.
    pub async fn run(mut self) {
        info!(
            registers = self.poller.table().len(),
            interval_ms = self.cycle_interval.as_millis() as u64,
            snapshot = %self.writer.path().display(),
            "Starting poll loop"
        );

        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.cycle_interval).await;
        }
    }

    async fn ensure_storage(&mut self) {
        match self.writer.prepare().await {
            Ok(()) => {
                self.storage_ready = true;
            }
            Err(e) => {
                self.health.record_storage_failure();
                error!(
                    error = %e,
                    "Snapshot storage unavailable; snapshots will fail until it recovers"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{RegisterDescriptor, RegisterTable, RegisterType, WordCount};
    use crate::transport::{ReadRequest, TransportError};
    use async_trait::async_trait;
    use meterpoll_common::HealthStatus;

    /// Answers every read with ones.
    struct OnesTransport;

    #[async_trait]
    impl RegisterTransport for OnesTransport {
        async fn read(&mut self, request: ReadRequest) -> Result<Vec<u16>, TransportError> {
            Ok(vec![1; usize::from(request.count)])
        }
    }

    fn scheduler(snapshot: PathBuf) -> CycleScheduler<OnesTransport> {
        let table = RegisterTable::new(vec![
            RegisterDescriptor::new("a", "V", 0, WordCount::One, RegisterType::Input, 1.0),
            RegisterDescriptor::new("b", "A", 1, WordCount::Two, RegisterType::Input, 1.0),
        ])
        .unwrap();
        let poller = RegisterPoller::new(OnesTransport, table, 1, Duration::ZERO);

        CycleScheduler::new(
            poller,
            SnapshotWriter::new(snapshot),
            Duration::from_secs(5),
            Arc::new(PollerHealth::new("test")),
        )
    }

    #[tokio::test]
    async fn test_run_cycle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let mut scheduler = scheduler(path.clone());

        scheduler.startup().await;
        let report = scheduler.run_cycle().await;

        assert_eq!(report.registers_total, 2);
        assert_eq!(report.registers_read, 2);
        assert!(report.persisted);
        assert_eq!(report.status(), HealthStatus::Healthy);

        let entries = parse_snapshot(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(entries["a"].value, 1.0);
        assert_eq!(entries["b"].value, 65537.0);
    }

    #[tokio::test]
    async fn test_startup_reads_back_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let mut first = scheduler(path.clone());
        assert_eq!(first.startup().await, None);
        first.run_cycle().await;

        // A restarted process sees the last persisted document
        let mut restarted = scheduler(path.clone());
        let previous = restarted.startup().await.unwrap();
        assert_eq!(previous, std::fs::read_to_string(&path).unwrap());
        assert_eq!(
            previous,
            r#"{"a":{"value":1.0,"unit":"V"},"b":{"value":65537.0,"unit":"A"}}"#
        );
    }

    #[tokio::test]
    async fn test_startup_passes_through_invalid_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "not json").unwrap();

        let mut scheduler = scheduler(path);
        assert_eq!(scheduler.startup().await.as_deref(), Some("not json"));
    }

    #[tokio::test]
    async fn test_persist_failure_is_contained() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // Parent is a regular file, so storage can never be prepared
        let mut scheduler = scheduler(file.path().join("snapshot.json"));

        scheduler.startup().await;
        let first = scheduler.run_cycle().await;
        let second = scheduler.run_cycle().await;

        assert!(!first.persisted);
        assert!(!second.persisted);
        assert_eq!(second.registers_read, 2);

        let snapshot = scheduler.health().snapshot();
        assert_eq!(snapshot.cycles_completed, 2);
        assert_eq!(snapshot.snapshots_failed, 2);
        // Once at startup, then once per cycle
        assert_eq!(snapshot.storage_failures, 3);
        assert_eq!(snapshot.status, HealthStatus::Error);
    }

    #[tokio::test]
    async fn test_status_file_written() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status.json");
        let mut scheduler = scheduler(dir.path().join("snapshot.json"))
            .with_status_path(Some(status.clone()));

        scheduler.run_cycle().await;

        let content = std::fs::read_to_string(&status).unwrap();
        let health: meterpoll_common::HealthSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(health.cycles_completed, 1);
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_repeats_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = scheduler(dir.path().join("snapshot.json"));
        let health = scheduler.health().clone();

        let handle = tokio::spawn(scheduler.run());

        // First cycle runs immediately, then one per 5 s interval
        tokio::time::sleep(Duration::from_millis(12_500)).await;
        handle.abort();

        assert_eq!(health.snapshot().cycles_completed, 3);
    }
}
