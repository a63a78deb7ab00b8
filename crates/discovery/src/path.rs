use crate::PATH_DELIMITER;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token that stands in for a run of array-index segments.
pub const INDEX_WILDCARD: &str = "[]";

/// A flattened path with array indices collapsed, used as the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Collapse every maximal run of digit-only segments into [`INDEX_WILDCARD`].
///
/// `Resources.0.Id` and `Resources.12.Id` both become `Resources.[].Id`;
/// `matrix.0.1.value` becomes `matrix.[].value`.
#[must_use]
pub fn normalize(path: &str) -> NormalizedPath {
    let mut out = String::with_capacity(path.len());
    let mut in_index_run = false;

    for (pos, segment) in path.split(PATH_DELIMITER).enumerate() {
        let is_index = is_index_segment(segment);
        if is_index && in_index_run {
            continue;
        }
        if pos > 0 {
            out.push(PATH_DELIMITER);
        }
        out.push_str(if is_index { INDEX_WILDCARD } else { segment });
        in_index_run = is_index;
    }

    NormalizedPath(out)
}

// An already-collapsed wildcard counts as an index so normalizing twice is a no-op.
fn is_index_segment(segment: &str) -> bool {
    segment == INDEX_WILDCARD
        || (!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
}
