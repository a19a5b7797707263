use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use shade::filter::{EntryFilter, MinimizeEntryFilter, PatternEntryFilter};
use shade::relocate::{Relocation, RelocationSpec};
use shade::transform::{
    ApacheNoticeResourceTransformer, AppendingTransformer, ManifestResourceTransformer,
    PluginsCacheFileTransformer, ResourceTransformer, ServiceFileTransformer,
    XmlAppendingTransformer,
};
use shade::{shade_with_progress, ShadeRequest};

/// Merge jars into a single relocated uber-jar
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input JARs; on duplicate entries the earlier jar wins
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output JAR
    #[arg(short, long)]
    output: PathBuf,

    /// Relocation rule, repeatable
    #[arg(long = "relocate", value_name = "FROM=TO")]
    relocations: Vec<String>,

    /// Raw regex rewrite of entry paths, repeatable
    #[arg(long = "raw-rule", value_name = "PATTERN=REPLACEMENT")]
    raw_rules: Vec<String>,

    /// JSON rules file with includes/excludes per rule
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Entry include glob, repeatable
    #[arg(long, value_name = "GLOB")]
    include: Vec<String>,

    /// Entry exclude glob, repeatable
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Set Main-Class in the merged manifest
    #[arg(long, value_name = "CLASS")]
    main_class: Option<String>,

    /// Merge META-INF/services provider descriptors
    #[arg(long)]
    merge_service_files: bool,

    /// Merge an XML resource by appending document roots, repeatable
    #[arg(long, value_name = "PATH")]
    merge_xml: Vec<String>,

    /// Concatenate a plain-text resource across inputs, repeatable
    #[arg(long, value_name = "PATH")]
    append: Vec<String>,

    /// Merge Apache NOTICE files under the given project name
    #[arg(long, value_name = "PROJECT")]
    apache_notice: Option<String>,

    /// Merge Log4j2 plugin caches
    #[arg(long)]
    merge_log4j2_plugins: bool,

    /// File listing dotted class names to drop, one per line
    #[arg(long, value_name = "FILE")]
    drop_classes: Option<PathBuf>,

    /// Keep input entry timestamps instead of normalizing them
    #[arg(long)]
    preserve_timestamps: bool,

    /// Rewrite package references in bundled source files
    #[arg(long)]
    shade_sources: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut relocations = Vec::new();
    for rule in &args.relocations {
        let (from, to) = rule
            .split_once('=')
            .with_context(|| format!("--relocate {rule}: expected FROM=TO"))?;
        relocations.push(Relocation::new(Some(from), Some(to)));
    }
    for rule in &args.raw_rules {
        let (pattern, replacement) = rule
            .split_once('=')
            .with_context(|| format!("--raw-rule {rule}: expected PATTERN=REPLACEMENT"))?;
        relocations.push(Relocation::raw(pattern, replacement)?);
    }
    if let Some(path) = &args.rules {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading rules file {}", path.display()))?;
        let specs: Vec<RelocationSpec> = serde_json::from_str(&text)
            .with_context(|| format!("parsing rules file {}", path.display()))?;
        for spec in &specs {
            relocations.push(spec.build()?);
        }
    }

    let mut transformers: Vec<Box<dyn ResourceTransformer>> = Vec::new();
    if args.merge_service_files {
        transformers.push(Box::new(ServiceFileTransformer::new()));
    }
    if let Some(main_class) = &args.main_class {
        transformers.push(Box::new(
            ManifestResourceTransformer::new().main_class(main_class),
        ));
    }
    for path in &args.merge_xml {
        transformers.push(Box::new(XmlAppendingTransformer::new(path)));
    }
    for path in &args.append {
        transformers.push(Box::new(AppendingTransformer::new(path)));
    }
    if let Some(project) = &args.apache_notice {
        transformers.push(Box::new(ApacheNoticeResourceTransformer::new(project)));
    }
    if args.merge_log4j2_plugins {
        transformers.push(Box::new(PluginsCacheFileTransformer::new()));
    }

    let mut filters: Vec<Box<dyn EntryFilter>> = Vec::new();
    if !args.include.is_empty() || !args.exclude.is_empty() {
        filters.push(Box::new(PatternEntryFilter::new(
            &args.include,
            &args.exclude,
        )?));
    }
    if let Some(path) = &args.drop_classes {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading class list {}", path.display()))?;
        let classes: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        filters.push(Box::new(MinimizeEntryFilter::new(classes)));
    }

    let progress = ProgressBar::new(args.inputs.len() as u64).with_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .expect("static template"),
    );

    let request = ShadeRequest {
        inputs: args.inputs,
        output: args.output,
        relocations,
        transformers,
        filters,
        preserve_timestamps: args.preserve_timestamps,
        shade_sources: args.shade_sources,
    };
    let stats = shade_with_progress(request, |jar| {
        progress.set_message(jar.display().to_string());
        progress.inc(1);
    })?;
    progress.finish_and_clear();

    println!("{stats}");
    Ok(())
}
