use crate::Result;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use trailscan_discovery::DiscoveryRecord;

pub const SUMMARY_HEADER: [&str; 4] = ["key", "value", "eventAction", "eventExampleId"];

/// Writes discoveries as a four-column CSV table.
#[derive(Debug, Clone)]
pub struct SummaryWriter {
    path: PathBuf,
}

impl SummaryWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the target file with a fresh table; returns the number of data rows.
    pub async fn write(&self, records: &[DiscoveryRecord]) -> Result<usize> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, render_csv(records)).await?;
        Ok(records.len())
    }

    /// Like [`SummaryWriter::write`], but failures are logged instead of returned.
    pub async fn write_best_effort(&self, records: &[DiscoveryRecord]) -> Option<usize> {
        match self.write(records).await {
            Ok(rows) => {
                log::info!(path:% = self.path.display(), rows = rows; "Wrote summary");
                Some(rows)
            }
            Err(err) => {
                log::error!(
                    path:% = self.path.display(),
                    error:% = err;
                    "Couldn't write summary file"
                );
                None
            }
        }
    }
}

#[must_use]
pub fn render_csv(records: &[DiscoveryRecord]) -> String {
    let mut out = String::new();
    push_row(&mut out, SUMMARY_HEADER);
    for record in records {
        push_row(
            &mut out,
            [
                record.path.as_str(),
                record.value.as_str(),
                record.action.as_str(),
                record.event_id.as_str(),
            ],
        );
    }
    out
}

fn push_row(out: &mut String, fields: [&str; 4]) {
    for (pos, field) in fields.into_iter().enumerate() {
        if pos > 0 {
            out.push(',');
        }
        out.push_str(&quote_field(field));
    }
    out.push('\n');
}

fn quote_field(field: &str) -> Cow<'_, str> {
    let needs_quotes = field.contains([',', '"', '\r', '\n'])
        || field.chars().next().is_some_and(char::is_whitespace);
    if !needs_quotes {
        return Cow::Borrowed(field);
    }
    Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
}
