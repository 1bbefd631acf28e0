//! Premortem Catalog
//!
//! The curated catalog of failure archetypes, validated once and then frozen:
//! - Lenient record decoding with per-record diagnostics
//! - Fail-fast on duplicate pattern ids
//! - Compiled, rarity-weighted signal matchers
//! - A content hash for report reproducibility
//!
//! # Example
//!
//! ```rust,ignore
//! use premortem_catalog::PatternRegistry;
//!
//! let registry = PatternRegistry::from_path("catalog/failure_patterns.json")?;
//! for pattern in registry.patterns() {
//!     println!("{} ({})", pattern.name, pattern.category);
//! }
//! println!("catalog {}", registry.hash().short());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod hash;
pub mod pattern;
pub mod registry;
pub mod signal;

pub use error::{CatalogError, RecordError};
pub use hash::{CatalogHash, HashError};
pub use pattern::{FailurePattern, PatternCategory, PatternId, PatternRecord};
pub use registry::{LoadDiagnostic, PatternEntry, PatternRegistry};
pub use signal::{normalize_text, SignalMatcher};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
