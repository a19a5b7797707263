use crate::engine::OutputJar;
use crate::relocate::RelocationSet;

use super::{ResourceTransformer, TransformContext};

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
const MANIFEST_VERSION: &str = "Manifest-Version";
// Java wraps manifest lines at 72 bytes including the CRLF.
const MAX_LINE: usize = 70;

/// Keeps the first manifest seen, then overlays a configured `Main-Class`
/// and any extra attributes. Later manifests are swallowed.
pub struct ManifestResourceTransformer {
    main_class: Option<String>,
    extra_attributes: Vec<(String, String)>,
    discovered: Option<Manifest>,
}

#[derive(Debug, Default, PartialEq)]
struct Manifest {
    /// Main-section attributes in file order, continuations unfolded.
    main: Vec<(String, String)>,
    /// Named sections after the first blank line, kept verbatim.
    rest: Vec<u8>,
}

impl ManifestResourceTransformer {
    pub fn new() -> Self {
        Self {
            main_class: None,
            extra_attributes: Vec::new(),
            discovered: None,
        }
    }

    pub fn main_class(mut self, name: &str) -> Self {
        self.main_class = Some(name.to_string());
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.extra_attributes.push((key.to_string(), value.to_string()));
        self
    }
}

impl Default for ManifestResourceTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTransformer for ManifestResourceTransformer {
    fn can_transform_resource(&self, path: &str) -> bool {
        path.eq_ignore_ascii_case(MANIFEST_PATH)
    }

    fn transform(&mut self, context: TransformContext<'_>) -> anyhow::Result<()> {
        if self.discovered.is_none() {
            self.discovered = Some(Manifest::parse(context.data));
        }
        Ok(())
    }

    fn has_transformed_resource(&self) -> bool {
        true
    }

    fn modify_output(
        &mut self,
        output: &mut OutputJar,
        _relocations: &RelocationSet,
    ) -> anyhow::Result<()> {
        let mut manifest = self.discovered.take().unwrap_or_default();
        if !manifest
            .main
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case(MANIFEST_VERSION))
        {
            manifest
                .main
                .insert(0, (MANIFEST_VERSION.to_string(), "1.0".to_string()));
        }
        if let Some(main_class) = &self.main_class {
            manifest.upsert("Main-Class", main_class);
        }
        for (key, value) in &self.extra_attributes {
            manifest.upsert(key, value);
        }
        output.put_file(MANIFEST_PATH, &manifest.to_bytes(), None)?;
        Ok(())
    }
}

impl Manifest {
    /// Lenient parse: continuation lines start with a single space, lines
    /// without a colon are dropped.
    fn parse(data: &[u8]) -> Self {
        let (main_bytes, rest) = split_main_section(data);
        let text = String::from_utf8_lossy(main_bytes);
        let mut main: Vec<(String, String)> = Vec::new();
        let mut current: Option<(String, String)> = None;
        for line in text.lines() {
            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(continuation);
                }
            } else {
                if let Some(done) = current.take() {
                    main.push(done);
                }
                if let Some((key, value)) = line.split_once(':') {
                    current = Some((key.trim().to_string(), value.trim_start().to_string()));
                }
            }
        }
        if let Some(done) = current.take() {
            main.push(done);
        }
        Self {
            main,
            rest: rest.to_vec(),
        }
    }

    fn upsert(&mut self, key: &str, value: &str) {
        for (k, v) in self.main.iter_mut() {
            if k.eq_ignore_ascii_case(key) {
                *v = value.to_string();
                return;
            }
        }
        self.main.push((key.to_string(), value.to_string()));
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, value) in &self.main {
            fold_line(&mut out, &format!("{key}: {value}"));
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.rest);
        out
    }
}

/// Splits the main section from named sections at the first blank line.
fn split_main_section(data: &[u8]) -> (&[u8], &[u8]) {
    for i in 0..data.len() {
        if data[i..].starts_with(b"\r\n\r\n") {
            return (&data[..i], &data[i + 4..]);
        }
        if data[i..].starts_with(b"\n\n") {
            return (&data[..i], &data[i + 2..]);
        }
    }
    (data, &[])
}

fn fold_line(out: &mut Vec<u8>, line: &str) {
    let bytes = line.as_bytes();
    let mut written = 0;
    let mut width = MAX_LINE;
    while bytes.len() - written > width {
        out.extend_from_slice(&bytes[written..written + width]);
        out.extend_from_slice(b"\r\n ");
        written += width;
        width = MAX_LINE - 1;
    }
    out.extend_from_slice(&bytes[written..]);
    out.extend_from_slice(b"\r\n");
}
