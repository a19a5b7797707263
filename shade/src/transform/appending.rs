use crate::engine::OutputJar;
use crate::relocate::RelocationSet;

use super::{ResourceTransformer, TransformContext};

/// Concatenates every occurrence of one resource with newline separation.
/// Suited to `META-INF/LICENSE`-style plain text.
pub struct AppendingTransformer {
    resource: String,
    data: Vec<u8>,
}

impl AppendingTransformer {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            data: Vec::new(),
        }
    }
}

impl ResourceTransformer for AppendingTransformer {
    fn can_transform_resource(&self, path: &str) -> bool {
        path.eq_ignore_ascii_case(&self.resource)
    }

    fn transform(&mut self, context: TransformContext<'_>) -> anyhow::Result<()> {
        self.data.extend_from_slice(context.data);
        if self.data.last().is_some_and(|&b| b != b'\n') {
            self.data.push(b'\n');
        }
        Ok(())
    }

    fn has_transformed_resource(&self) -> bool {
        !self.data.is_empty()
    }

    fn modify_output(
        &mut self,
        output: &mut OutputJar,
        _relocations: &RelocationSet,
    ) -> anyhow::Result<()> {
        if !self.data.is_empty() {
            let data = std::mem::take(&mut self.data);
            output.put_file(&self.resource, &data, None)?;
        }
        Ok(())
    }
}
