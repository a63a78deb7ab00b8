use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const ARN_PREFIX: &str = "arn:";

// Letters, a hyphen, then a 17- or 8-character alphanumeric body (`i-0123456789abcdef0`,
// `sg-0a1b2c3d`). Anchored so `x-12345678-tail` does not match.
static RESOURCE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z]+-([a-zA-Z0-9]{17}|[a-zA-Z0-9]{8})$")
        .expect("Invalid resource id regex pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Starts with `arn:`
    Arn,
    /// `<prefix>-<8 or 17 alphanumerics>`
    ResourceId,
}

impl IdentifierKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arn => "arn",
            Self::ResourceId => "resource_id",
        }
    }
}

/// Which identifier shape `value` has, if any. ARN wins when both would match.
#[must_use]
pub fn identify(value: &str) -> Option<IdentifierKind> {
    if value.starts_with(ARN_PREFIX) {
        return Some(IdentifierKind::Arn);
    }
    if RESOURCE_ID.is_match(value) {
        return Some(IdentifierKind::ResourceId);
    }
    None
}

/// True if `value` looks like a resource identifier worth recording.
#[must_use]
pub fn classify(value: &str) -> bool {
    identify(value).is_some()
}
