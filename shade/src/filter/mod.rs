//! Entry filters drop input entries before transformers or the remapper
//! ever see them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::relocate::{PathGlob, RelocationError};
use crate::stats::ShadeStats;

pub trait EntryFilter {
    /// Whether this filter applies to entries of the given input archive.
    fn applies_to(&self, _archive: &Path) -> bool {
        true
    }

    fn is_excluded(&mut self, entry_path: &str) -> bool;

    /// Called once after all inputs are processed.
    fn finished(&mut self, _stats: &mut ShadeStats) {}
}

/// Include/exclude globs, optionally scoped to specific input archives.
/// Entries fail when not included or when excluded; excludes always win.
pub struct PatternEntryFilter {
    archives: Option<Vec<PathBuf>>,
    includes: Vec<PathGlob>,
    excludes: Vec<PathGlob>,
    dropped: u64,
}

impl PatternEntryFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self, RelocationError> {
        let compile = |patterns: &[String]| -> Result<Vec<PathGlob>, RelocationError> {
            patterns
                .iter()
                .map(|p| {
                    PathGlob::new(p).map_err(|source| RelocationError::Glob {
                        pattern: p.clone(),
                        source,
                    })
                })
                .collect()
        };
        Ok(Self {
            archives: None,
            includes: compile(includes)?,
            excludes: compile(excludes)?,
            dropped: 0,
        })
    }

    /// Restricts the filter to entries coming from the given archives.
    pub fn for_archives(mut self, archives: Vec<PathBuf>) -> Self {
        self.archives = Some(archives);
        self
    }
}

impl EntryFilter for PatternEntryFilter {
    fn applies_to(&self, archive: &Path) -> bool {
        match &self.archives {
            Some(archives) => archives.iter().any(|a| a == archive),
            None => true,
        }
    }

    fn is_excluded(&mut self, entry_path: &str) -> bool {
        let included =
            self.includes.is_empty() || self.includes.iter().any(|g| g.matches(entry_path));
        let excluded = self.excludes.iter().any(|g| g.matches(entry_path));
        if !included || excluded {
            self.dropped += 1;
            return true;
        }
        false
    }

    fn finished(&mut self, _stats: &mut ShadeStats) {
        if self.dropped > 0 {
            info!(dropped = self.dropped, "pattern filter dropped entries");
        }
    }
}

/// Drops class entries named in a precomputed removal set, as produced by
/// an external reachability analysis. The set holds dotted class names.
pub struct MinimizeEntryFilter {
    removed: HashSet<String>,
    dropped: u64,
}

impl MinimizeEntryFilter {
    pub fn new(removed: impl IntoIterator<Item = String>) -> Self {
        Self {
            removed: removed.into_iter().collect(),
            dropped: 0,
        }
    }
}

impl EntryFilter for MinimizeEntryFilter {
    fn is_excluded(&mut self, entry_path: &str) -> bool {
        let Some(stem) = entry_path.strip_suffix(".class") else {
            return false;
        };
        let dotted = stem.replace('/', ".");
        if self.removed.contains(&dotted) {
            self.dropped += 1;
            return true;
        }
        false
    }

    fn finished(&mut self, _stats: &mut ShadeStats) {
        info!(dropped = self.dropped, "minimization dropped unused classes");
    }
}
