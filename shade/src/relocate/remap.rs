use std::sync::atomic::{AtomicUsize, Ordering};

use super::rule::Relocation;

/// An ordered set of relocation rules with first-match-wins semantics,
/// shared read-only across the remapper, transformers and the engine.
///
/// Applied relocations are counted through a relaxed atomic so callers can
/// hold `&RelocationSet` everywhere.
#[derive(Debug, Default)]
pub struct RelocationSet {
    rules: Vec<Relocation>,
    applied: AtomicUsize,
}

impl RelocationSet {
    pub fn new(rules: Vec<Relocation>) -> Self {
        Self {
            rules,
            applied: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relocation> {
        self.rules.iter()
    }

    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }

    fn record(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Maps a name from the constant pool: an internal class name, a dotted
    /// class name or an `[*L...` array descriptor head. The descriptor
    /// prefix is detached before the rules see the name.
    pub fn map_name(&self, name: &str) -> String {
        let (prefix, stripped) = split_descriptor_prefix(name);
        for rule in &self.rules {
            if rule.can_relocate_class(stripped) {
                self.record();
                return format!("{prefix}{}", rule.relocate_class(stripped));
            } else if rule.can_relocate_path(stripped) {
                self.record();
                return format!("{prefix}{}", rule.relocate_path(stripped));
            }
        }
        name.to_string()
    }

    /// String constants go through the same mapping as names, so literals
    /// naming relocated classes follow them.
    pub fn map_string(&self, value: &str) -> String {
        self.map_name(value)
    }

    /// Maps a class entry path with its extension stripped at the first dot.
    /// The caller re-attaches `.class`.
    pub fn map_path(&self, path: &str) -> String {
        let stem = match path.find('.') {
            Some(dot) => &path[..dot],
            None => path,
        };
        self.map_name(stem)
    }

    /// Maps a full resource path, extension included.
    pub fn map_resource_path(&self, path: &str) -> String {
        self.map_name(path)
    }

    /// Relocates a dotted class name, as found in service descriptors and
    /// plugin caches. Returns the input unchanged when no rule applies.
    pub fn relocate_class_name(&self, class_name: &str) -> String {
        for rule in &self.rules {
            if rule.can_relocate_class(class_name) {
                self.record();
                return rule.relocate_class(class_name);
            }
        }
        class_name.to_string()
    }
}

/// Splits an optional `[[...L` descriptor head off a constant-pool name.
fn split_descriptor_prefix(name: &str) -> (&str, &str) {
    let brackets = name.bytes().take_while(|&b| b == b'[').count();
    let rest = &name[brackets..];
    if let Some(inner) = rest.strip_prefix('L') {
        if !inner.is_empty() {
            return (&name[..brackets + 1], inner);
        }
    }
    ("", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relocate::Relocation;

    fn set() -> RelocationSet {
        RelocationSet::new(vec![Relocation::new(
            Some("org.foo"),
            Some("shaded.org.foo"),
        )])
    }

    #[test]
    fn internal_names_map_through_the_path_domain() {
        assert_eq!(set().map_name("org/foo/Bar"), "shaded/org/foo/Bar");
        assert_eq!(set().map_name("org/other/Bar"), "org/other/Bar");
    }

    #[test]
    fn dotted_names_map_through_the_class_domain() {
        assert_eq!(set().map_name("org.foo.Bar"), "shaded.org.foo.Bar");
    }

    #[test]
    fn array_descriptor_heads_are_preserved() {
        assert_eq!(
            set().map_name("[[Lorg/foo/Bar;"),
            "[[Lshaded/org/foo/Bar;"
        );
    }

    #[test]
    fn class_entry_paths_strip_the_extension() {
        assert_eq!(set().map_path("org/foo/Bar.class"), "shaded/org/foo/Bar");
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = RelocationSet::new(vec![
            Relocation::new(Some("org.foo"), Some("first.org.foo")),
            Relocation::new(Some("org.foo"), Some("second.org.foo")),
        ]);
        assert_eq!(rules.map_name("org/foo/Bar"), "first/org/foo/Bar");
    }

    #[test]
    fn applied_counter_tracks_hits() {
        let rules = set();
        rules.map_name("org/foo/Bar");
        rules.map_name("untouched/Name");
        rules.relocate_class_name("org.foo.Baz");
        assert_eq!(rules.applied(), 2);
    }
}
