//! Gap classification and scoring
//!
//! Turns mapper output plus drift observations into the final typed gap
//! set: deterministic signal-to-type mapping, severity assignment,
//! priority scoring and natural-key deduplication, reconciled against the
//! previous run's gaps so human status decisions survive.

pub mod classifier;
pub mod priority;

pub use classifier::{ClassifyInput, GapClassifier};
pub use priority::{compute_priority, recency_weight, RECENCY_FLOOR};
