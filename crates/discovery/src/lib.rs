//! # trailscan discovery
//!
//! Pure building blocks for finding identifier-like values in audit-event
//! payloads.
//!
//! ## Pipeline
//!
//! ```text
//! CloudTrailEvent payload (JSON string)
//!     │
//!     ├──> Flattener
//!     │      └─> (path, scalar) pairs, e.g. `resources.0.ARN`
//!     │
//!     ├──> Path Normalizer
//!     │      └─> schema key, e.g. `resources.[].ARN`
//!     │
//!     ├──> Classifier (string leaves only)
//!     │      └─> ARN / resource id / nothing
//!     │
//!     └──> Discovery Cache (first write wins)
//! ```
//!
//! ## Example
//!
//! ```
//! use trailscan_discovery::{classify, flatten, normalize, DiscoveryCache, FlatValue};
//!
//! let payload = r#"{"resources":[{"ARN":"arn:aws:s3:::bucket"}]}"#;
//! let mut cache = DiscoveryCache::new();
//! for field in flatten(payload).unwrap() {
//!     let FlatValue::String(value) = &field.value else { continue };
//!     let key = normalize(&field.path);
//!     if cache.contains(&key) || !classify(value) {
//!         continue;
//!     }
//!     cache.try_insert(key, value.clone(), "GetObject", "evt-1");
//! }
//! assert_eq!(cache.len(), 1);
//! ```

mod cache;
mod classifier;
mod error;
mod flatten;
mod path;

pub use cache::{DiscoveryCache, DiscoveryRecord};
pub use classifier::{classify, identify, IdentifierKind};
pub use error::{FlattenError, Result};
pub use flatten::{flatten, FlatField, FlatValue, PATH_DELIMITER};
pub use path::{normalize, NormalizedPath, INDEX_WILDCARD};
