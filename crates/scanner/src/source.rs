use crate::{EventPage, PageToken, RawEvent, Result, ScanError, SourceError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Paginated access to the audit-event log.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch the page that starts at `token`, or the first page when `None`.
    async fn lookup_events(
        &self,
        token: Option<&PageToken>,
    ) -> std::result::Result<EventPage, SourceError>;
}

/// Serves a previously exported `lookup-events` dump page by page.
///
/// The dump may be a single `{"Events": [...]}` document, several such
/// documents (one per line, as produced by paging the CLI), or a bare JSON
/// array of events. Continuation tokens are decimal offsets into the dump.
#[derive(Debug)]
pub struct ReplaySource {
    path: PathBuf,
    events: Vec<RawEvent>,
    page_size: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DumpDocument {
    Page {
        #[serde(rename = "Events")]
        events: Vec<RawEvent>,
    },
    Events(Vec<RawEvent>),
}

#[derive(Deserialize)]
struct RegionProbe {
    #[serde(rename = "awsRegion")]
    aws_region: Option<String>,
}

impl ReplaySource {
    /// Load every event from `path`.
    ///
    /// With `region` set, events whose payload names another `awsRegion` are
    /// left out, the way a regional endpoint would only see its own trail.
    pub async fn open(path: &Path, page_size: usize, region: Option<&str>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| ScanError::Other(format!("read event dump {}: {err}", path.display())))?;
        let mut source = Self::from_json(&raw, page_size)
            .map_err(|err| ScanError::Other(format!("parse event dump {}: {err}", path.display())))?;
        source.path = path.to_path_buf();

        if let Some(region) = region {
            let before = source.events.len();
            source.events.retain(|event| in_region(event, region));
            let skipped = before - source.events.len();
            if skipped > 0 {
                log::info!(
                    region = region,
                    skipped = skipped;
                    "Skipped events recorded in other regions"
                );
            }
        }

        log::debug!(
            path:% = path.display(),
            events = source.events.len(),
            page_size = source.page_size;
            "Loaded event dump"
        );
        Ok(source)
    }

    pub fn from_json(raw: &str, page_size: usize) -> Result<Self> {
        let mut events = Vec::new();
        for document in serde_json::Deserializer::from_str(raw).into_iter::<DumpDocument>() {
            match document? {
                DumpDocument::Page { events: page } | DumpDocument::Events(page) => {
                    events.extend(page);
                }
            }
        }
        Ok(Self::from_events(events, page_size))
    }

    pub fn from_events(events: Vec<RawEvent>, page_size: usize) -> Self {
        Self {
            path: PathBuf::new(),
            events,
            page_size: page_size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn in_region(event: &RawEvent, region: &str) -> bool {
    // Unparseable payloads are kept so the worker can report them.
    match serde_json::from_str::<RegionProbe>(event.payload()) {
        Ok(RegionProbe {
            aws_region: Some(recorded),
        }) => recorded == region,
        _ => true,
    }
}

#[async_trait]
impl EventSource for ReplaySource {
    async fn lookup_events(
        &self,
        token: Option<&PageToken>,
    ) -> std::result::Result<EventPage, SourceError> {
        let start = match token {
            None => 0,
            Some(token) => token
                .as_str()
                .parse::<usize>()
                .ok()
                .filter(|offset| *offset <= self.events.len())
                .ok_or_else(|| SourceError::Malformed(format!("unknown next token {token}")))?,
        };
        let end = (start + self.page_size).min(self.events.len());
        let next_token = (end < self.events.len()).then(|| PageToken::new(end.to_string()));

        Ok(EventPage::new(self.events[start..end].to_vec(), next_token))
    }
}
