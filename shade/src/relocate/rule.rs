use regex::Regex;
use serde::Deserialize;
use smallvec::SmallVec;
use thiserror::Error;

use super::patterns::{selected, PathGlob};
use super::source;

#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("invalid glob pattern {pattern}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid raw pattern {pattern}: {source}")]
    Raw {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One relocation rule: a source package/path prefix, a destination prefix
/// and optional include/exclude globs narrowing what the rule touches.
///
/// Every pattern is held in two spellings, dotted (`org.foo`) for the class
/// name domain and slashed (`org/foo`) for the archive path domain.
#[derive(Debug)]
pub struct Relocation {
    pattern: String,
    path_pattern: String,
    shaded_pattern: String,
    shaded_path_pattern: String,
    raw: Option<Regex>,
    includes: Vec<PathGlob>,
    excludes: Vec<PathGlob>,
    source_package_excludes: Vec<String>,
    source_path_excludes: Vec<String>,
}

impl Relocation {
    /// A `None` pattern relocates everything; a `None` shaded pattern hides
    /// the source under a `hidden` prefix.
    pub fn new(pattern: Option<&str>, shaded_pattern: Option<&str>) -> Self {
        let (pattern, path_pattern) = match pattern {
            Some(p) => (p.replace('/', "."), p.replace('.', "/")),
            None => (String::new(), String::new()),
        };
        let (shaded_pattern, shaded_path_pattern) = match shaded_pattern {
            Some(s) => (s.replace('/', "."), s.replace('.', "/")),
            None => (format!("hidden.{pattern}"), format!("hidden/{path_pattern}")),
        };
        Self {
            pattern,
            path_pattern,
            shaded_pattern,
            shaded_path_pattern,
            raw: None,
            includes: Vec::new(),
            excludes: Vec::new(),
            source_package_excludes: Vec::new(),
            source_path_excludes: Vec::new(),
        }
    }

    /// A raw rule: `pattern` is a regular expression searched anywhere in an
    /// entry path, `replacement` may use `$n` capture references. Raw rules
    /// never touch class names, only paths and string constants.
    pub fn raw(pattern: &str, replacement: &str) -> Result<Self, RelocationError> {
        let regex = Regex::new(pattern).map_err(|source| RelocationError::Raw {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: String::new(),
            path_pattern: pattern.to_string(),
            shaded_pattern: String::new(),
            shaded_path_pattern: replacement.to_string(),
            raw: Some(regex),
            includes: Vec::new(),
            excludes: Vec::new(),
            source_package_excludes: Vec::new(),
            source_path_excludes: Vec::new(),
        })
    }

    pub fn include(mut self, pattern: &str) -> Result<Self, RelocationError> {
        for normalized in normalize_pattern(pattern) {
            self.includes.push(compile_glob(&normalized)?);
        }
        Ok(self)
    }

    pub fn exclude(mut self, pattern: &str) -> Result<Self, RelocationError> {
        for normalized in normalize_pattern(pattern) {
            self.excludes.push(compile_glob(&normalized)?);
        }
        // Excludes under the rule's own prefix also guard source-text
        // shading: the remainder after the prefix is matched against the
        // text that follows an occurrence.
        if let Some(rest) = pattern.strip_prefix(self.pattern.as_str()) {
            if !self.pattern.is_empty() {
                let rest = rest.strip_suffix(".*").unwrap_or(rest);
                self.source_package_excludes.push(rest.to_string());
            }
        } else if let Some(rest) = pattern.strip_prefix(self.path_pattern.as_str()) {
            if !self.path_pattern.is_empty() {
                let rest = rest.strip_suffix("/*").unwrap_or(rest);
                self.source_path_excludes.push(rest.to_string());
            }
        }
        Ok(self)
    }

    pub fn is_raw(&self) -> bool {
        self.raw.is_some()
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    pub fn shaded_path_pattern(&self) -> &str {
        &self.shaded_path_pattern
    }

    /// Whether this rule applies to a slashed archive path. A trailing
    /// `.class` and a single leading `/` are tolerated and ignored.
    pub fn can_relocate_path(&self, path: &str) -> bool {
        if let Some(regex) = &self.raw {
            return regex.is_match(path);
        }
        if path.len() < self.path_pattern.len() {
            return false;
        }
        let mut adjusted = path;
        if let Some(stem) = adjusted.strip_suffix(".class") {
            if stem.is_empty() {
                return false;
            }
            adjusted = stem;
        }
        let adjusted = adjusted.strip_prefix('/').unwrap_or(adjusted);
        adjusted.starts_with(&self.path_pattern)
            && selected(adjusted, &self.includes, &self.excludes)
    }

    /// Whether this rule applies to a dotted class name. Names that already
    /// contain a `/` belong to the path domain and are rejected here.
    pub fn can_relocate_class(&self, class_name: &str) -> bool {
        self.raw.is_none()
            && !class_name.contains('/')
            && self.can_relocate_path(&class_name.replace('.', "/"))
    }

    pub fn relocate_path(&self, path: &str) -> String {
        match &self.raw {
            Some(regex) => regex
                .replace_all(path, self.shaded_path_pattern.as_str())
                .into_owned(),
            None => path.replacen(&self.path_pattern, &self.shaded_path_pattern, 1),
        }
    }

    pub fn relocate_class(&self, class_name: &str) -> String {
        if self.raw.is_some() {
            return class_name.to_string();
        }
        class_name.replacen(&self.pattern, &self.shaded_pattern, 1)
    }

    /// Best-effort rewrite of textual source content, first in the dotted
    /// domain and then in the slashed one. Raw rules leave sources alone.
    pub fn apply_to_source_content(&self, content: &str) -> String {
        if self.raw.is_some() || self.pattern.is_empty() {
            return content.to_string();
        }
        let shaded = source::shade_with_excludes(
            content,
            &self.pattern,
            &self.shaded_pattern,
            &self.source_package_excludes,
        );
        source::shade_with_excludes(
            &shaded,
            &self.path_pattern,
            &self.shaded_path_pattern,
            &self.source_path_excludes,
        )
    }
}

fn compile_glob(pattern: &str) -> Result<PathGlob, RelocationError> {
    PathGlob::new(pattern).map_err(|source| RelocationError::Glob {
        pattern: pattern.to_string(),
        source,
    })
}

/// Expands a glob into its slashed form, plus the bare parent package for
/// patterns ending in `/*` or `/**` so the package directory itself matches.
fn normalize_pattern(pattern: &str) -> SmallVec<[String; 2]> {
    let class_pattern = pattern.replace('.', "/");
    let mut normalized = SmallVec::new();
    if let Some(parent) = class_pattern
        .strip_suffix("/**")
        .or_else(|| class_pattern.strip_suffix("/*"))
    {
        normalized.push(parent.to_string());
    }
    normalized.push(class_pattern);
    normalized
}

/// Declarative form of a rule, as loaded from a rules file.
#[derive(Debug, Clone, Deserialize)]
pub struct RelocationSpec {
    pub pattern: Option<String>,
    pub shaded_pattern: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub raw: bool,
}

impl RelocationSpec {
    pub fn build(&self) -> Result<Relocation, RelocationError> {
        if self.raw {
            return Relocation::raw(
                self.pattern.as_deref().unwrap_or_default(),
                self.shaded_pattern.as_deref().unwrap_or_default(),
            );
        }
        let mut rule = Relocation::new(self.pattern.as_deref(), self.shaded_pattern.as_deref());
        for include in &self.includes {
            rule = rule.include(include)?;
        }
        for exclude in &self.excludes {
            rule = rule.exclude(exclude)?;
        }
        Ok(rule)
    }
}
