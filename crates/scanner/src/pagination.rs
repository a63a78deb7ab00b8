use crate::{EventPage, EventSource, PageToken, RawEvent, RetryPolicy, SourceError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How a pagination run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationOutcome {
    /// The source returned a page without a continuation token.
    #[default]
    Completed,
    /// Retry budget exhausted, a non-retryable source error, or the worker went away.
    Aborted,
    /// Stopped through the cancellation token.
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationReport {
    pub outcome: PaginationOutcome,
    /// Pages fetched successfully
    pub pages: usize,
    /// Events handed to the worker queue
    pub events: usize,
    /// Lookup calls issued, retries included
    pub fetch_attempts: usize,
    pub retries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

enum DriverState {
    Fetching,
    Retrying(SourceError),
    DrainingPage(EventPage),
    Done,
    Aborted(String),
    Cancelled,
}

/// Walks the event log page by page and feeds every event into the worker queue.
///
/// The driver holds the only sender of the queue, so dropping it (by letting
/// [`PaginationDriver::run`] return) is what tells the worker to finish.
pub struct PaginationDriver<'a> {
    source: &'a dyn EventSource,
    events: mpsc::Sender<RawEvent>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        source: &'a dyn EventSource,
        events: mpsc::Sender<RawEvent>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            events,
            retry,
            cancel,
        }
    }

    pub async fn run(self) -> PaginationReport {
        let mut report = PaginationReport::default();
        let mut token: Option<PageToken> = None;
        let mut retries_in_row: u32 = 0;
        let mut state = DriverState::Fetching;

        loop {
            state = match state {
                DriverState::Fetching => self.fetch(token.as_ref(), &mut report).await,
                DriverState::Retrying(err) => {
                    if !err.is_transient() {
                        log::error!(
                            error:% = err,
                            next_token = token_label(token.as_ref());
                            "Lookup failed with a non-retryable error"
                        );
                        DriverState::Aborted(err.to_string())
                    } else if retries_in_row >= self.retry.max_retries {
                        log::error!(
                            error:% = err,
                            next_token = token_label(token.as_ref()),
                            attempts = retries_in_row + 1;
                            "Giving up on lookup after exhausting retries"
                        );
                        DriverState::Aborted(format!(
                            "{err} (after {} attempts)",
                            retries_in_row + 1
                        ))
                    } else {
                        retries_in_row += 1;
                        report.retries += 1;
                        self.back_off(retries_in_row, token.as_ref()).await
                    }
                }
                DriverState::DrainingPage(page) => {
                    retries_in_row = 0;
                    report.pages += 1;
                    let EventPage { events, next_token } = page;
                    if let Some(stop) = self.push_page(events, &mut report).await {
                        stop
                    } else {
                        match next_token {
                            Some(next) => {
                                token = Some(next);
                                DriverState::Fetching
                            }
                            None => DriverState::Done,
                        }
                    }
                }
                DriverState::Done => {
                    report.outcome = PaginationOutcome::Completed;
                    break;
                }
                DriverState::Aborted(reason) => {
                    report.outcome = PaginationOutcome::Aborted;
                    report.abort_reason = Some(reason);
                    break;
                }
                DriverState::Cancelled => {
                    report.outcome = PaginationOutcome::Cancelled;
                    break;
                }
            };
        }

        log::info!(
            outcome:? = report.outcome,
            pages = report.pages,
            events = report.events,
            fetch_attempts = report.fetch_attempts;
            "Pagination finished"
        );
        report
    }

    async fn fetch(&self, token: Option<&PageToken>, report: &mut PaginationReport) -> DriverState {
        if self.cancel.is_cancelled() {
            return DriverState::Cancelled;
        }
        report.fetch_attempts += 1;
        log::info!(next_token = token_label(token); "Looking up events");

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return DriverState::Cancelled,
            result = self.source.lookup_events(token) => result,
        };

        match result {
            Ok(page) => DriverState::DrainingPage(page),
            Err(err) => {
                log::error!(
                    error:% = err,
                    next_token = token_label(token);
                    "Couldn't look up events"
                );
                DriverState::Retrying(err)
            }
        }
    }

    async fn back_off(&self, retry: u32, token: Option<&PageToken>) -> DriverState {
        let delay = self.retry.delay_for(retry);
        log::warn!(
            next_token = token_label(token),
            retry = retry,
            delay_ms = delay.as_millis() as u64;
            "Retrying lookup"
        );
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => DriverState::Cancelled,
            () = tokio::time::sleep(delay) => DriverState::Fetching,
        }
    }

    /// Push a page in order; `Some` means the run has to stop early.
    async fn push_page(
        &self,
        events: Vec<RawEvent>,
        report: &mut PaginationReport,
    ) -> Option<DriverState> {
        for event in events {
            let sent = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Some(DriverState::Cancelled),
                sent = self.events.send(event) => sent,
            };
            if let Err(err) = sent {
                log::error!(event_id = err.0.event_id(); "Event worker stopped accepting events");
                return Some(DriverState::Aborted("event worker stopped".to_string()));
            }
            report.events += 1;
        }
        None
    }
}

fn token_label(token: Option<&PageToken>) -> &str {
    token.map(PageToken::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of lookup results and records the tokens it was asked for.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<EventPage, SourceError>>>,
        fallback: Option<SourceError>,
        calls: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<EventPage, SourceError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn always_failing() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Some(SourceError::Transient("throttled".to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Option<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn lookup_events(&self, token: Option<&PageToken>) -> Result<EventPage, SourceError> {
            self.calls
                .lock()
                .unwrap()
                .push(token.map(|t| t.as_str().to_string()));
            let next = self.script.lock().unwrap().pop_front();
            match (next, &self.fallback) {
                (Some(result), _) => result,
                (None, Some(err)) => Err(err.clone()),
                (None, None) => panic!("lookup called past the end of the script"),
            }
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Result<EventPage, SourceError> {
        let events = ids
            .iter()
            .map(|id| RawEvent::new(*id, "Test", "{}"))
            .collect();
        Ok(EventPage::new(events, next.map(PageToken::new)))
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_backoff_ms: 10,
            max_backoff_ms: 100,
        }
    }

    async fn drive(source: &dyn EventSource, capacity: usize) -> (PaginationReport, Vec<String>) {
        let (tx, mut rx) = mpsc::channel(capacity);
        let driver = PaginationDriver::new(source, tx, fast_retry(), CancellationToken::new());
        let report = driver.run().await;
        let mut ids = Vec::new();
        while let Some(event) = rx.recv().await {
            ids.push(event.event_id().to_string());
        }
        (report, ids)
    }

    #[tokio::test]
    async fn fetches_exactly_one_call_per_page() {
        let source = ScriptedSource::new(vec![
            page(&["a", "b"], Some("t1")),
            page(&["c"], Some("t2")),
            page(&["d"], None),
        ]);

        let (report, ids) = drive(&source, 16).await;

        assert_eq!(report.outcome, PaginationOutcome::Completed);
        assert_eq!(report.fetch_attempts, 3);
        assert_eq!(report.pages, 3);
        assert_eq!(report.events, 4);
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(
            source.calls(),
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_page_with_token_keeps_going() {
        let source = ScriptedSource::new(vec![page(&[], Some("t1")), page(&["a"], None)]);
        let (report, ids) = drive(&source, 4).await;
        assert_eq!(report.pages, 2);
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retry_budget() {
        let source = ScriptedSource::always_failing();

        let (report, ids) = drive(&source, 4).await;

        assert_eq!(report.outcome, PaginationOutcome::Aborted);
        assert_eq!(report.fetch_attempts, 4);
        assert_eq!(report.retries, 3);
        assert!(ids.is_empty());
        assert!(report.abort_reason.unwrap().contains("after 4 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_keep_the_token_and_reset_after_success() {
        let throttled = || Err(SourceError::Transient("throttled".to_string()));
        let source = ScriptedSource::new(vec![
            page(&["a"], Some("t1")),
            throttled(),
            throttled(),
            throttled(),
            page(&["b"], Some("t2")),
            throttled(),
            throttled(),
            page(&["c"], None),
        ]);

        let (report, ids) = drive(&source, 4).await;

        assert_eq!(report.outcome, PaginationOutcome::Completed);
        assert_eq!(report.retries, 5);
        assert_eq!(report.fetch_attempts, 8);
        assert_eq!(ids, vec!["a", "b", "c"]);
        let calls = source.calls();
        assert_eq!(&calls[1..5], &vec![Some("t1".to_string()); 4][..]);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_results_survive_an_abort() {
        let throttled = || Err(SourceError::Transient("throttled".to_string()));
        let source = ScriptedSource::new(vec![
            page(&["a", "b"], Some("t1")),
            throttled(),
            throttled(),
            throttled(),
            throttled(),
        ]);

        let (report, ids) = drive(&source, 4).await;

        assert_eq!(report.outcome, PaginationOutcome::Aborted);
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn non_retryable_error_aborts_immediately() {
        let source = ScriptedSource::new(vec![Err(SourceError::Malformed("bad token".to_string()))]);
        let (report, _) = drive(&source, 4).await;
        assert_eq!(report.outcome, PaginationOutcome::Aborted);
        assert_eq!(report.fetch_attempts, 1);
        assert_eq!(report.retries, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_fetch() {
        let source = ScriptedSource::new(vec![page(&["a"], Some("t1")), page(&["b"], None)]);
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = PaginationDriver::new(&source, tx, fast_retry(), cancel)
            .run()
            .await;

        assert_eq!(report.outcome, PaginationOutcome::Cancelled);
        assert_eq!(report.fetch_attempts, 0);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_full_queue() {
        let source = ScriptedSource::new(vec![page(&["a", "b", "c"], None)]);
        // capacity 1 and nobody receiving: the second push blocks until cancelled
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let driver = PaginationDriver::new(&source, tx, fast_retry(), cancel);
        let (report, ()) = tokio::join!(driver.run(), async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        assert_eq!(report.outcome, PaginationOutcome::Cancelled);
        assert_eq!(report.events, 1);
    }

    #[tokio::test]
    async fn closed_queue_aborts() {
        let source = ScriptedSource::new(vec![page(&["a"], Some("t1"))]);
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        let report = PaginationDriver::new(&source, tx, fast_retry(), CancellationToken::new())
            .run()
            .await;

        assert_eq!(report.outcome, PaginationOutcome::Aborted);
        assert_eq!(report.events, 0);
    }
}
