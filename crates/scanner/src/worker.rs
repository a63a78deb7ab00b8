use crate::RawEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use trailscan_discovery::{flatten, identify, normalize, DiscoveryCache, FlatValue, IdentifierKind};

/// Counters collected while processing events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Events taken off the queue
    pub events: usize,

    /// Events whose payload could not be flattened
    pub malformed: usize,

    /// String leaves looked at (after flattening)
    pub fields_examined: usize,

    /// New paths recorded in the cache
    pub discoveries: usize,
}

/// What the worker hands back once its queue is closed and drained.
#[derive(Debug)]
pub struct WorkerReport {
    pub cache: DiscoveryCache,
    pub stats: WorkerStats,
}

/// Single consumer that turns raw events into cache entries.
///
/// The worker owns its [`DiscoveryCache`] outright; nobody else can observe
/// it until [`EventWorker::run`] returns.
#[derive(Debug, Default)]
pub struct EventWorker {
    cache: DiscoveryCache,
    stats: WorkerStats,
}

impl EventWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: DiscoveryCache::with_capacity(capacity),
            stats: WorkerStats::default(),
        }
    }

    /// Process events until every sender is dropped and the queue is empty.
    pub async fn run(mut self, mut events: mpsc::Receiver<RawEvent>) -> WorkerReport {
        log::debug!("Starting worker");
        while let Some(event) = events.recv().await {
            self.handle_event(&event);
        }
        log::debug!(
            events = self.stats.events,
            discoveries = self.stats.discoveries;
            "Stopping worker"
        );
        self.into_report()
    }

    pub fn handle_event(&mut self, event: &RawEvent) {
        self.stats.events += 1;
        let event_id = event.event_id();
        let action = event.action();

        let fields = match flatten(event.payload()) {
            Ok(fields) => fields,
            Err(err) => {
                self.stats.malformed += 1;
                log::error!(
                    error:% = err,
                    event_id = event_id,
                    action = action;
                    "Failed to flatten event payload"
                );
                return;
            }
        };

        for field in fields {
            let FlatValue::String(value) = field.value else {
                continue;
            };
            self.stats.fields_examined += 1;

            let key = normalize(&field.path);
            if self.cache.contains(&key) {
                continue;
            }
            let Some(kind) = identify(&value) else {
                continue;
            };

            let message = match kind {
                IdentifierKind::Arn => "Has arn",
                IdentifierKind::ResourceId => "Has resource id",
            };
            log::info!(
                key:% = key,
                value = value.as_str(),
                action = action,
                event_id = event_id;
                "{message}"
            );

            if self.cache.try_insert(key, value, action, event_id) {
                self.stats.discoveries += 1;
            }
        }
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn into_report(self) -> WorkerReport {
        WorkerReport {
            cache: self.cache,
            stats: self.stats,
        }
    }
}
