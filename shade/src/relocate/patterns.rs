use regex::Regex;

/// Glob pattern matched against slash-separated archive paths.
///
/// `*` and `**` match any run of characters including separators, `?`
/// matches a single non-separator character, everything else is literal.
/// The pattern is anchored at both ends.
#[derive(Debug, Clone)]
pub struct PathGlob {
    regex: Regex,
}

impl PathGlob {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push('^');
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                    }
                    source.push_str(".*");
                }
                '?' => source.push_str("[^/]"),
                c => {
                    let mut buf = [0u8; 4];
                    source.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                }
            }
        }
        source.push('$');
        Ok(Self {
            regex: Regex::new(&source)?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// True when `path` passes an include/exclude pair: empty includes admit
/// everything, excludes always win.
pub fn selected(path: &str, includes: &[PathGlob], excludes: &[PathGlob]) -> bool {
    let included = includes.is_empty() || includes.iter().any(|g| g.matches(path));
    included && !excludes.iter().any(|g| g.matches(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_is_anchored() {
        let glob = PathGlob::new("org/foo/Bar").unwrap();
        assert!(glob.matches("org/foo/Bar"));
        assert!(!glob.matches("org/foo/Barbecue"));
        assert!(!glob.matches("xorg/foo/Bar"));
    }

    #[test]
    fn star_crosses_segments() {
        let glob = PathGlob::new("org/foo/*").unwrap();
        assert!(glob.matches("org/foo/Bar"));
        assert!(glob.matches("org/foo/deep/Nested"));
    }

    #[test]
    fn double_star_matches_like_star() {
        let glob = PathGlob::new("META-INF/services/**").unwrap();
        assert!(glob.matches("META-INF/services/com.example.Plugin"));
        assert!(!glob.matches("META-INF/MANIFEST.MF"));
    }

    #[test]
    fn question_mark_stays_within_a_segment() {
        let glob = PathGlob::new("org/?oo/Bar").unwrap();
        assert!(glob.matches("org/foo/Bar"));
        assert!(glob.matches("org/zoo/Bar"));
        assert!(!glob.matches("org//oo/Bar"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let glob = PathGlob::new("a+b/c.txt").unwrap();
        assert!(glob.matches("a+b/c.txt"));
        assert!(!glob.matches("ab/cxtxt"));
    }

    #[test]
    fn excludes_win_over_includes() {
        let includes = vec![PathGlob::new("org/foo/**").unwrap()];
        let excludes = vec![PathGlob::new("org/foo/internal/**").unwrap()];
        assert!(selected("org/foo/Api", &includes, &excludes));
        assert!(!selected("org/foo/internal/Secret", &includes, &excludes));
    }

    #[test]
    fn empty_includes_admit_everything() {
        assert!(selected("anything/at/all", &[], &[]));
    }
}
