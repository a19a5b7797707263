//! The merge engine: streams every entry of every input archive through
//! filters, transformers and the remapper into a single output archive.

mod output;

pub use output::{OutputError, OutputJar};

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::classfile::remap_class;
use crate::error::ShadeError;
use crate::filter::EntryFilter;
use crate::relocate::{Relocation, RelocationSet};
use crate::stats::ShadeStats;
use crate::transform::{ResourceTransformer, TransformContext};

const JAR_INDEX: &str = "META-INF/INDEX.LIST";

const SOURCE_SUFFIXES: [&str; 4] = [".java", ".kt", ".groovy", ".scala"];

fn multi_release_prefix() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"^META-INF/versions/\d+/").expect("static regex"))
}

/// Everything one shading run needs. Requests are consumed by [`shade`];
/// transformers and filters carry run state and are never reused.
pub struct ShadeRequest {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub relocations: Vec<Relocation>,
    pub transformers: Vec<Box<dyn ResourceTransformer>>,
    pub filters: Vec<Box<dyn EntryFilter>>,
    pub preserve_timestamps: bool,
    pub shade_sources: bool,
}

pub fn shade(request: ShadeRequest) -> Result<ShadeStats, ShadeError> {
    shade_with_progress(request, |_| {})
}

/// Runs the merge, invoking `on_jar` before each input archive is read.
/// The output is written to a temporary file next to the destination and
/// renamed into place only after the whole merge succeeded.
pub fn shade_with_progress(
    request: ShadeRequest,
    mut on_jar: impl FnMut(&Path),
) -> Result<ShadeStats, ShadeError> {
    let ShadeRequest {
        inputs,
        output: output_path,
        relocations,
        mut transformers,
        mut filters,
        preserve_timestamps,
        shade_sources,
    } = request;

    let remapper = RelocationSet::new(relocations);
    let mut stats = ShadeStats::new();
    for rule in remapper.iter() {
        if !rule.is_raw() {
            stats.relocate(rule.path_pattern(), rule.shaded_path_pattern());
        }
    }

    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let publish_error = |source| ShadeError::OutputPublish {
        path: output_path.clone(),
        source,
    };
    let spool = tempfile::NamedTempFile::new_in(parent).map_err(&publish_error)?;
    let file = spool.reopen().map_err(&publish_error)?;
    let mut out = OutputJar::new(file, preserve_timestamps);

    for input in &inputs {
        on_jar(input);
        stats.start_jar();
        process_input(
            input,
            &remapper,
            &mut transformers,
            &mut filters,
            shade_sources,
            &mut out,
            &mut stats,
        )?;
        stats.finish_jar();
    }

    for transformer in transformers.iter_mut() {
        if transformer.has_transformed_resource() {
            transformer
                .modify_output(&mut out, &remapper)
                .map_err(|source| ShadeError::Transform {
                    entry: "<merged resource>".to_string(),
                    source,
                })?;
        }
    }
    for filter in filters.iter_mut() {
        filter.finished(&mut stats);
    }
    stats.relocations_applied = remapper.applied();

    out.finish()?;
    spool
        .persist(&output_path)
        .map_err(|e| ShadeError::OutputPublish {
            path: output_path.clone(),
            source: e.error,
        })?;
    info!(output = %output_path.display(), "wrote merged archive");
    Ok(stats)
}

fn process_input(
    input: &Path,
    remapper: &RelocationSet,
    transformers: &mut [Box<dyn ResourceTransformer>],
    filters: &mut [Box<dyn EntryFilter>],
    shade_sources: bool,
    out: &mut OutputJar,
    stats: &mut ShadeStats,
) -> Result<(), ShadeError> {
    let file = File::open(input).map_err(|source| ShadeError::ArchiveOpen {
        path: input.to_path_buf(),
        source,
    })?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|source| ShadeError::MalformedArchive {
            path: input.to_path_buf(),
            source,
        })?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|source| ShadeError::MalformedArchive {
                path: input.to_path_buf(),
                source,
            })?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name == JAR_INDEX {
            // An index would be stale after merging.
            debug!(entry = %name, "dropping jar index");
            stats.resources_dropped += 1;
            continue;
        }
        if filters
            .iter_mut()
            .any(|f| f.applies_to(input) && f.is_excluded(&name))
        {
            debug!(entry = %name, "entry filtered out");
            stats.resources_dropped += 1;
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|source| ShadeError::EntryRead {
                archive: input.to_path_buf(),
                entry: name.clone(),
                source,
            })?;
        let modified = entry.last_modified();

        if name.ends_with(".class") {
            copy_class(input, &name, &data, modified, remapper, out, stats)?;
        } else if let Some(transformer) = transformers
            .iter_mut()
            .find(|t| t.can_transform_resource(&name))
        {
            transformer
                .transform(TransformContext {
                    path: name.clone(),
                    data: &data,
                    relocations: remapper,
                })
                .map_err(|source| ShadeError::Transform {
                    entry: name.clone(),
                    source,
                })?;
            stats.resources_merged += 1;
        } else if shade_sources && is_source(&name) {
            let mut content = String::from_utf8_lossy(&data).into_owned();
            for rule in remapper.iter() {
                content = rule.apply_to_source_content(&content);
            }
            let mapped = remapper.map_resource_path(&name);
            write_resource(out, &mapped, content.as_bytes(), modified, stats)?;
        } else {
            let mapped = remapper.map_resource_path(&name);
            write_resource(out, &mapped, &data, modified, stats)?;
        }
    }
    Ok(())
}

fn copy_class(
    input: &Path,
    name: &str,
    data: &[u8],
    modified: Option<zip::DateTime>,
    remapper: &RelocationSet,
    out: &mut OutputJar,
    stats: &mut ShadeStats,
) -> Result<(), ShadeError> {
    // Without rules there is nothing to rewrite; skip the parse entirely.
    if remapper.is_empty() {
        return put_class(out, name, data, modified, stats, false);
    }

    // Versioned entries relocate like their top-level counterpart.
    let (prefix, stem) = split_multi_release(name);
    let mapped_name = format!("{prefix}{}.class", remapper.map_path(stem));

    let outcome = remap_class(
        data,
        &|n| remapper.map_name(n),
        &|s| remapper.map_string(s),
    )
    .map_err(|source| ShadeError::MalformedClass {
        archive: input.to_path_buf(),
        entry: name.to_string(),
        source,
    })?;
    for warning in &outcome.warnings {
        warn!(entry = %name, "{warning}");
        stats.warn(format!("{name}: {warning}"));
    }

    put_class(out, &mapped_name, &outcome.bytes, modified, stats, outcome.changed)
}

fn put_class(
    out: &mut OutputJar,
    name: &str,
    data: &[u8],
    modified: Option<zip::DateTime>,
    stats: &mut ShadeStats,
    changed: bool,
) -> Result<(), ShadeError> {
    match out.put_file(name, data, modified) {
        Ok(()) => {
            if changed {
                stats.classes_remapped += 1;
            }
            Ok(())
        }
        Err(OutputError::Duplicate(duplicate)) => {
            warn!(entry = %duplicate, "duplicate class, keeping the first occurrence");
            stats.warn(format!("duplicate class {duplicate}"));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn write_resource(
    out: &mut OutputJar,
    name: &str,
    data: &[u8],
    modified: Option<zip::DateTime>,
    stats: &mut ShadeStats,
) -> Result<(), ShadeError> {
    match out.put_file(name, data, modified) {
        Ok(()) => Ok(()),
        Err(OutputError::Duplicate(duplicate)) => {
            debug!(entry = %duplicate, "duplicate resource, keeping the first occurrence");
            stats.resources_dropped += 1;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn is_source(name: &str) -> bool {
    SOURCE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Splits a `META-INF/versions/<n>/` prefix off a multi-release entry.
fn split_multi_release(name: &str) -> (&str, &str) {
    match multi_release_prefix().find(name) {
        Some(m) => (&name[..m.end()], &name[m.end()..]),
        None => ("", name),
    }
}
