use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use anyhow::{bail, Context};
use tempfile::NamedTempFile;

use crate::engine::OutputJar;
use crate::relocate::RelocationSet;

use super::{ResourceTransformer, TransformContext};

const PLUGIN_CACHE_FILE: &str =
    "org/apache/logging/log4j/core/config/plugins/Log4j2Plugins.dat";

#[derive(Debug, Clone, PartialEq, Eq)]
struct PluginEntry {
    key: String,
    class_name: String,
    name: String,
    printable: bool,
    defer: bool,
}

type PluginCache = BTreeMap<String, BTreeMap<String, PluginEntry>>;

/// Merges Log4j2 plugin caches. Each occurrence is spooled to a temporary
/// file during the input pass, then the caches are aggregated, plugin class
/// names are relocated and one merged cache is written. The spool files are
/// removed when the transformer is dropped, run failure included.
pub struct PluginsCacheFileTransformer {
    spooled: Vec<NamedTempFile>,
}

impl PluginsCacheFileTransformer {
    pub fn new() -> Self {
        Self {
            spooled: Vec::new(),
        }
    }
}

impl Default for PluginsCacheFileTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTransformer for PluginsCacheFileTransformer {
    fn can_transform_resource(&self, path: &str) -> bool {
        path == PLUGIN_CACHE_FILE
    }

    fn transform(&mut self, context: TransformContext<'_>) -> anyhow::Result<()> {
        let mut spool = NamedTempFile::new().context("spooling plugin cache")?;
        spool.write_all(context.data)?;
        self.spooled.push(spool);
        Ok(())
    }

    fn has_transformed_resource(&self) -> bool {
        !self.spooled.is_empty()
    }

    fn modify_output(
        &mut self,
        output: &mut OutputJar,
        relocations: &RelocationSet,
    ) -> anyhow::Result<()> {
        if self.spooled.is_empty() {
            return Ok(());
        }
        let mut cache = PluginCache::new();
        for spool in self.spooled.drain(..) {
            let data = fs::read(spool.path())?;
            read_cache(&mut cache, &data)
                .context("malformed Log4j2 plugin cache")?;
        }
        for category in cache.values_mut() {
            for entry in category.values_mut() {
                entry.class_name = relocations.relocate_class_name(&entry.class_name);
            }
        }
        output.put_file(PLUGIN_CACHE_FILE, &write_cache(&cache)?, None)?;
        Ok(())
    }
}

/// The cache is a `DataOutputStream` dump: an i32 category count, then per
/// category its name and entries, strings as u16-length-prefixed UTF-8.
/// Java writes modified UTF-8, which only diverges for NUL and
/// supplementary characters; plugin keys and class names are ASCII.
fn read_cache(cache: &mut PluginCache, data: &[u8]) -> anyhow::Result<()> {
    let mut pos = 0usize;
    let categories = read_u32(data, &mut pos)?;
    for _ in 0..categories {
        let category = read_utf(data, &mut pos)?;
        let entries = read_u32(data, &mut pos)?;
        let slot = cache.entry(category).or_default();
        for _ in 0..entries {
            let key = read_utf(data, &mut pos)?;
            let class_name = read_utf(data, &mut pos)?;
            let name = read_utf(data, &mut pos)?;
            let printable = read_bool(data, &mut pos)?;
            let defer = read_bool(data, &mut pos)?;
            slot.insert(
                key.clone(),
                PluginEntry {
                    key,
                    class_name,
                    name,
                    printable,
                    defer,
                },
            );
        }
    }
    Ok(())
}

fn write_cache(cache: &PluginCache) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    write_u32(&mut out, cache.len())?;
    for (category, entries) in cache {
        write_utf(&mut out, category)?;
        write_u32(&mut out, entries.len())?;
        for entry in entries.values() {
            write_utf(&mut out, &entry.key)?;
            write_utf(&mut out, &entry.class_name)?;
            write_utf(&mut out, &entry.name)?;
            out.push(entry.printable as u8);
            out.push(entry.defer as u8);
        }
    }
    Ok(out)
}

fn read_u32(data: &[u8], pos: &mut usize) -> anyhow::Result<u32> {
    let end = *pos + 4;
    let Some(bytes) = data.get(*pos..end) else {
        bail!("truncated cache");
    };
    *pos = end;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_bool(data: &[u8], pos: &mut usize) -> anyhow::Result<bool> {
    let Some(&byte) = data.get(*pos) else {
        bail!("truncated cache");
    };
    *pos += 1;
    Ok(byte != 0)
}

fn read_utf(data: &[u8], pos: &mut usize) -> anyhow::Result<String> {
    let Some(bytes) = data.get(*pos..*pos + 2) else {
        bail!("truncated cache");
    };
    let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    *pos += 2;
    let end = *pos + len;
    let Some(bytes) = data.get(*pos..end) else {
        bail!("truncated cache");
    };
    *pos = end;
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn write_u32(out: &mut Vec<u8>, value: usize) -> anyhow::Result<()> {
    let value = u32::try_from(value).context("cache too large")?;
    out.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

fn write_utf(out: &mut Vec<u8>, value: &str) -> anyhow::Result<()> {
    let len = u16::try_from(value.len()).context("cache string too long")?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relocate::Relocation;

    fn sample_cache() -> Vec<u8> {
        let mut cache = PluginCache::new();
        cache.entry("core".to_string()).or_default().insert(
            "appender".to_string(),
            PluginEntry {
                key: "appender".to_string(),
                class_name: "org.foo.log.Appender".to_string(),
                name: "Appender".to_string(),
                printable: true,
                defer: false,
            },
        );
        write_cache(&cache).unwrap()
    }

    #[test]
    fn cache_roundtrips() {
        let bytes = sample_cache();
        let mut cache = PluginCache::new();
        read_cache(&mut cache, &bytes).unwrap();
        assert_eq!(cache["core"]["appender"].class_name, "org.foo.log.Appender");
        assert!(cache["core"]["appender"].printable);
        assert!(!cache["core"]["appender"].defer);
        assert_eq!(write_cache(&cache).unwrap(), bytes);
    }

    #[test]
    fn caches_merge_and_class_names_relocate() {
        let rules = RelocationSet::new(vec![Relocation::new(
            Some("org.foo"),
            Some("shaded.org.foo"),
        )]);
        let mut t = PluginsCacheFileTransformer::new();
        t.transform(TransformContext {
            path: PLUGIN_CACHE_FILE.to_string(),
            data: &sample_cache(),
            relocations: &rules,
        })
        .unwrap();
        assert!(t.has_transformed_resource());

        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.jar");
        let mut out = OutputJar::new(std::fs::File::create(&out_path).unwrap(), false);
        t.modify_output(&mut out, &rules).unwrap();
        out.finish().unwrap();

        let mut archive =
            zip::ZipArchive::new(std::fs::File::open(&out_path).unwrap()).unwrap();
        let mut entry = archive.by_name(PLUGIN_CACHE_FILE).unwrap();
        let mut data = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut data).unwrap();
        let mut cache = PluginCache::new();
        read_cache(&mut cache, &data).unwrap();
        assert_eq!(
            cache["core"]["appender"].class_name,
            "shaded.org.foo.log.Appender"
        );
    }

    #[test]
    fn truncated_cache_is_an_error() {
        let mut cache = PluginCache::new();
        let bytes = sample_cache();
        assert!(read_cache(&mut cache, &bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn only_the_cache_path_matches() {
        let t = PluginsCacheFileTransformer::new();
        assert!(t.can_transform_resource(PLUGIN_CACHE_FILE));
        assert!(!t.can_transform_resource("org/apache/logging/log4j/other.dat"));
    }
}
