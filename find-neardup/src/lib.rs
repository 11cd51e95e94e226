//! Near-duplicate search over text records with exact edit distance and MinHash LSH.
//!
//! Small collections are compared exhaustively with [`EditDistanceEngine`]. Larger
//! ones go through [`HybridPipeline`], where an [`LshIndex`] narrows each query to a
//! few candidates that the engine then verifies exactly.
#![deny(missing_docs)]

pub mod config;
pub mod engine;
pub mod errors;
pub mod feature;
pub mod filter;
pub mod index;
pub mod pipeline;
pub mod record;
pub mod scheduler;

pub(crate) mod cache;
pub(crate) mod shingling;

pub use config::IndexConfig;
pub use edit_distance::KernelKind;
pub use engine::EditDistanceEngine;
pub use errors::FindNeardupError;
pub use filter::{CharBagFilter, LengthFilter, PreFilter};
pub use index::{IndexStats, LshIndex};
pub use pipeline::HybridPipeline;
pub use record::{ComparisonResult, FieldWeights, PreparedRecord, Record};
