//! Relocation rules and the composed remapping used across the pipeline.
//!
//! A [`Relocation`] moves one package/path prefix, a [`RelocationSet`]
//! applies an ordered list of them with first-match-wins semantics.

mod patterns;
mod remap;
mod rule;
mod source;

pub use patterns::PathGlob;
pub use remap::RelocationSet;
pub use rule::{Relocation, RelocationError, RelocationSpec};
