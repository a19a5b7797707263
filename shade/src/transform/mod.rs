//! Resource transformers: pluggable merge strategies for entries that more
//! than one input archive contributes. A transformer claims matching
//! entries while the inputs stream by, then emits its merged result once
//! every input has been read.

mod appending;
mod manifest;
mod notice;
mod plugins;
mod service;
mod xml;

pub use appending::AppendingTransformer;
pub use manifest::ManifestResourceTransformer;
pub use notice::ApacheNoticeResourceTransformer;
pub use plugins::PluginsCacheFileTransformer;
pub use service::ServiceFileTransformer;
pub use xml::XmlAppendingTransformer;

use crate::engine::OutputJar;
use crate::relocate::RelocationSet;

/// One matching entry, offered to a transformer during the input pass.
pub struct TransformContext<'a> {
    /// The entry's path as found in the input archive. Transformers apply
    /// relocations themselves where their format calls for it.
    pub path: String,
    pub data: &'a [u8],
    pub relocations: &'a RelocationSet,
}

pub trait ResourceTransformer {
    fn can_transform_resource(&self, path: &str) -> bool;

    /// Consumes one matching entry. The entry will not be copied to the
    /// output; the transformer owns it from here.
    fn transform(&mut self, context: TransformContext<'_>) -> anyhow::Result<()>;

    fn has_transformed_resource(&self) -> bool;

    /// Writes the merged result and resets the transformer.
    fn modify_output(
        &mut self,
        output: &mut OutputJar,
        relocations: &RelocationSet,
    ) -> anyhow::Result<()>;
}
