use crate::{
    EventSource, EventWorker, PaginationDriver, PaginationOutcome, PaginationReport, Result,
    ScanConfig, ScanError, SummaryWriter, WorkerStats,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use trailscan_discovery::DiscoveryRecord;

/// Expected number of distinct paths; only sizes the initial allocation.
const CACHE_CAPACITY_HINT: usize = 10_000;

/// Why the scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTrigger {
    Completed,
    Aborted,
    Interrupted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub trigger: ScanTrigger,
    pub pagination: PaginationReport,
    pub worker: WorkerStats,
    pub discoveries: Vec<DiscoveryRecord>,
    /// Rows written to the summary file, `None` if writing failed.
    pub summary_rows: Option<usize>,
    pub duration_ms: u64,
}

/// Lets exactly one caller through, however many termination paths race for it.
#[derive(Debug, Default)]
pub struct SummaryGate {
    taken: AtomicBool,
}

impl SummaryGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` for the first caller only.
    pub fn try_acquire(&self) -> bool {
        self.taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_taken(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }
}

/// Owns one scan from start to summary.
///
/// Shutdown always runs the same sequence regardless of what ended the scan:
/// stop the driver, let the worker drain the queue, take the cache back from
/// the worker, write the summary once.
pub struct Coordinator {
    source: Arc<dyn EventSource>,
    config: ScanConfig,
    summary_gate: Arc<SummaryGate>,
}

impl Coordinator {
    pub fn new(source: Arc<dyn EventSource>, config: ScanConfig) -> Self {
        Self {
            source,
            config,
            summary_gate: Arc::new(SummaryGate::new()),
        }
    }

    pub fn summary_gate(&self) -> Arc<SummaryGate> {
        self.summary_gate.clone()
    }

    /// Run a full scan; `shutdown` resolving means an operator interrupt.
    pub async fn run<F>(self, shutdown: F) -> Result<ScanReport>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));

        // The worker must be consuming before the first page is pushed.
        let worker = tokio::spawn(EventWorker::with_capacity(CACHE_CAPACITY_HINT).run(rx));

        log::info!(
            region = self.config.region.as_str(),
            queue_capacity = self.config.queue_capacity;
            "Starting scan"
        );
        let driver = PaginationDriver::new(
            self.source.as_ref(),
            tx,
            self.config.retry.clone(),
            cancel.clone(),
        );
        let mut pagination = Box::pin(driver.run());
        tokio::pin!(shutdown);

        let (pagination_report, interrupted) = tokio::select! {
            report = &mut pagination => (report, false),
            () = &mut shutdown => {
                log::warn!("Interrupt received, stopping scan");
                cancel.cancel();
                ((&mut pagination).await, true)
            }
        };
        // Dropping the driver closes the queue; the worker finishes what is buffered.
        drop(pagination);

        let worker_report = worker
            .await
            .map_err(|err| ScanError::WorkerError(err.to_string()))?;

        let trigger = if interrupted {
            ScanTrigger::Interrupted
        } else {
            match pagination_report.outcome {
                PaginationOutcome::Completed => ScanTrigger::Completed,
                PaginationOutcome::Aborted | PaginationOutcome::Cancelled => ScanTrigger::Aborted,
            }
        };

        let discoveries = worker_report.cache.into_records();
        let summary_rows = self.write_summary(&discoveries).await;

        Ok(ScanReport {
            trigger,
            pagination: pagination_report,
            worker: worker_report.stats,
            discoveries,
            summary_rows,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn write_summary(&self, records: &[DiscoveryRecord]) -> Option<usize> {
        if !self.summary_gate.try_acquire() {
            log::warn!("Summary already written, skipping");
            return None;
        }
        SummaryWriter::new(&self.config.summary_path)
            .write_best_effort(records)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventPage, PageToken, RawEvent, ReplaySource, SourceError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn gate_opens_once() {
        let gate = SummaryGate::new();
        assert!(!gate.is_taken());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        assert!(gate.is_taken());
    }

    #[tokio::test]
    async fn second_summary_attempt_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig {
            summary_path: dir.path().join("summary.csv"),
            ..ScanConfig::default()
        };
        let coordinator = Coordinator::new(Arc::new(ReplaySource::from_events(Vec::new(), 50)), config);

        assert_eq!(coordinator.write_summary(&[]).await, Some(0));
        assert_eq!(coordinator.write_summary(&[]).await, None);
    }

    /// Endless stream of pages that never finishes on its own.
    struct EndlessSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventSource for EndlessSource {
        async fn lookup_events(
            &self,
            _token: Option<&PageToken>,
        ) -> std::result::Result<EventPage, SourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let payload = format!(r#"{{"resources":[{{"ARN":"arn:aws:s3:::bucket-{n}"}}]}}"#);
            Ok(EventPage::new(
                vec![RawEvent::new(format!("evt-{n}"), "GetObject", payload)],
                Some(PageToken::new((n + 1).to_string())),
            ))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_an_endless_scan_and_still_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let summary_path = dir.path().join("summary.csv");
        let config = ScanConfig {
            summary_path: summary_path.clone(),
            ..ScanConfig::default()
        };
        let coordinator = Coordinator::new(
            Arc::new(EndlessSource {
                calls: AtomicUsize::new(0),
            }),
            config,
        );
        let gate = coordinator.summary_gate();

        let report = coordinator
            .run(tokio::time::sleep(std::time::Duration::from_millis(55)))
            .await
            .unwrap();

        assert_eq!(report.trigger, ScanTrigger::Interrupted);
        assert_eq!(report.pagination.outcome, PaginationOutcome::Cancelled);
        assert!(report.pagination.pages >= 1);
        // every event pushed before the interrupt was processed
        assert_eq!(report.worker.events, report.pagination.events);
        assert_eq!(report.discoveries.len(), 1);
        assert_eq!(report.discoveries[0].event_id, "evt-0");
        assert_eq!(report.summary_rows, Some(1));
        assert!(gate.is_taken());

        let body = tokio::fs::read_to_string(&summary_path).await.unwrap();
        assert_eq!(
            body,
            "key,value,eventAction,eventExampleId\nresources.[].ARN,arn:aws:s3:::bucket-0,GetObject,evt-0\n"
        );
    }
}
