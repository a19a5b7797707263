use std::sync::OnceLock;

use regex::Regex;

/// Matches dot, slash or space at end of string.
fn ends_with_dot_slash_space() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"[./ ]$").expect("static regex"))
}

/// Matches certain Java keywords + space, the beginning of a Javadoc link,
/// or punctuation that introduces a fresh expression, at end of string.
fn ends_with_java_keyword() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| {
        Regex::new(
            r"\b(import|package|public|protected|private|static|final|synchronized|abstract|volatile|extends|implements|throws) $|\{@link( \*)* $|([{}(=;,]|\*/) $",
        )
        .expect("static regex")
    })
}

fn whitespace_run() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Replaces word-bounded occurrences of `from` with `to` in source text.
///
/// An occurrence survives unchanged when the text after it starts with one
/// of `excluded`, or when the preceding text ends in a dot, slash or space
/// that is not itself preceded by a keyword that legitimately introduces a
/// package name. This keeps `foo.org.example` and Javadoc prose intact
/// while rewriting imports and qualified references.
pub(crate) fn shade_with_excludes(
    source: &str,
    from: &str,
    to: &str,
    excluded: &[String],
) -> String {
    let boundary = match Regex::new(&format!(r"\b{}\b", from.replace('.', "[.]"))) {
        Ok(rx) => rx,
        Err(_) => return source.to_string(),
    };
    let mut snippets: Vec<&str> = boundary.split(source).collect();
    while snippets.last().is_some_and(|s| s.is_empty()) {
        snippets.pop();
    }

    let mut shaded = String::with_capacity(source.len() * 11 / 10);
    for (i, snippet) in snippets.iter().enumerate() {
        if i == 0 {
            shaded.push_str(snippet);
            continue;
        }
        let do_exclude = excluded.iter().any(|e| snippet.starts_with(e.as_str()));
        let previous_one_line = whitespace_run().replace_all(snippets[i - 1], " ");
        let after_dot_slash_space = ends_with_dot_slash_space().is_match(&previous_one_line);
        let after_java_keyword = ends_with_java_keyword().is_match(&previous_one_line);
        let should_exclude = do_exclude || (after_dot_slash_space && !after_java_keyword);
        shaded.push_str(if should_exclude { from } else { to });
        shaded.push_str(snippet);
    }
    shaded
}
