use anyhow::Context;
use xml::EmitterConfig;
use xmltree::Element;

use crate::engine::OutputJar;
use crate::relocate::RelocationSet;

use super::{ResourceTransformer, TransformContext};

/// Merges occurrences of one XML resource: the first document becomes the
/// base, root attributes missing from the base are copied over and every
/// further root's children are appended.
pub struct XmlAppendingTransformer {
    resource: String,
    doc: Option<Element>,
}

impl XmlAppendingTransformer {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            doc: None,
        }
    }
}

impl ResourceTransformer for XmlAppendingTransformer {
    fn can_transform_resource(&self, path: &str) -> bool {
        path.eq_ignore_ascii_case(&self.resource)
    }

    fn transform(&mut self, context: TransformContext<'_>) -> anyhow::Result<()> {
        let parsed = Element::parse(context.data)
            .with_context(|| format!("unparseable XML in {}", context.path))?;
        match &mut self.doc {
            None => self.doc = Some(parsed),
            Some(base) => {
                for (key, value) in &parsed.attributes {
                    if !base.attributes.contains_key(key) {
                        base.attributes.insert(key.clone(), value.clone());
                    }
                }
                base.children.extend(parsed.children);
            }
        }
        Ok(())
    }

    fn has_transformed_resource(&self) -> bool {
        self.doc.is_some()
    }

    fn modify_output(
        &mut self,
        output: &mut OutputJar,
        _relocations: &RelocationSet,
    ) -> anyhow::Result<()> {
        if let Some(doc) = self.doc.take() {
            let mut data = Vec::new();
            let config = EmitterConfig::new().perform_indent(true);
            doc.write_with_config(&mut data, config)?;
            output.put_file(&self.resource, &data, None)?;
        }
        Ok(())
    }
}
