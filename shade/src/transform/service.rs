use std::collections::BTreeMap;

use crate::engine::OutputJar;
use crate::relocate::{PathGlob, RelocationSet};

use super::{ResourceTransformer, TransformContext};

const SERVICES_PATTERN: &str = "META-INF/services/**";
const GROOVY_EXTENSION_MODULE_DESCRIPTOR: &str =
    "META-INF/services/org.codehaus.groovy.runtime.ExtensionModule";

/// Concatenates `META-INF/services/` provider descriptors. Both the
/// descriptor file name and the provider class names on each line follow
/// the configured relocations.
pub struct ServiceFileTransformer {
    includes: Vec<PathGlob>,
    excludes: Vec<PathGlob>,
    entries: BTreeMap<String, Vec<u8>>,
}

impl ServiceFileTransformer {
    pub fn new() -> Self {
        Self {
            includes: vec![PathGlob::new(SERVICES_PATTERN).expect("static pattern")],
            excludes: vec![PathGlob::new(GROOVY_EXTENSION_MODULE_DESCRIPTOR).expect("static pattern")],
            entries: BTreeMap::new(),
        }
    }

    /// Points the transformer at a non-standard descriptor directory.
    pub fn with_path(mut self, path: &str) -> Result<Self, regex::Error> {
        self.includes = vec![PathGlob::new(&format!("{path}/**"))?];
        Ok(self)
    }

    fn append(&mut self, path: &str, line: &str) {
        let stream = self.entries.entry(path.to_string()).or_default();
        if stream
            .last()
            .is_some_and(|&b| b != b'\n' && b != b'\r')
        {
            stream.push(b'\n');
        }
        stream.extend_from_slice(line.as_bytes());
    }
}

impl Default for ServiceFileTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTransformer for ServiceFileTransformer {
    fn can_transform_resource(&self, path: &str) -> bool {
        self.includes.iter().any(|g| g.matches(path))
            && !self.excludes.iter().any(|g| g.matches(path))
    }

    fn transform(&mut self, context: TransformContext<'_>) -> anyhow::Result<()> {
        let text = String::from_utf8_lossy(context.data);
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut target_path = context.path.clone();
        for rule in context.relocations.iter() {
            // The descriptor's file name is itself a class name.
            let base = target_path.rsplit('/').next().unwrap_or(&target_path);
            if rule.can_relocate_class(base) {
                target_path = rule.relocate_class(&target_path);
            }
            for line in lines.iter_mut() {
                if rule.can_relocate_class(line) {
                    *line = rule.relocate_class(line);
                }
            }
        }
        for line in &lines {
            self.append(&target_path, line);
        }
        Ok(())
    }

    fn has_transformed_resource(&self) -> bool {
        !self.entries.is_empty()
    }

    fn modify_output(
        &mut self,
        output: &mut OutputJar,
        _relocations: &RelocationSet,
    ) -> anyhow::Result<()> {
        for (path, stream) in std::mem::take(&mut self.entries) {
            output.put_file(&path, &stream, None)?;
        }
        Ok(())
    }
}
