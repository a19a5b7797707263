//! Merge a set of jars into one uber-archive. Class files are remapped
//! under relocated package names, duplicate resources resolve first-wins,
//! and well-known metadata files are merged by resource transformers
//! instead of being clobbered by whichever jar came first.

pub mod classfile;
pub mod engine;
pub mod error;
pub mod filter;
pub mod relocate;
pub mod stats;
pub mod transform;

pub use engine::{shade, shade_with_progress, ShadeRequest};
pub use error::ShadeError;
pub use relocate::{Relocation, RelocationSet};
pub use stats::ShadeStats;
