//! Generic signature rewriting (JVMS 4.7.9.1).
//!
//! Signatures are re-emitted by a recursive descent over the grammar,
//! mapping the package-qualified base of every class type signature and
//! leaving type variables, inner-class suffixes and base types alone.
//! All entry points return `None` for signatures that do not parse, so
//! callers can keep the original and warn instead of failing the class.

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, b: u8) -> Option<()> {
        (self.bump()? == b).then_some(())
    }

    fn done(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Consumes an identifier-ish run up to any of the given stop bytes.
    fn until(&mut self, stops: &[u8]) -> Option<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stops.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }
}

pub fn rewrite_class_signature(sig: &str, map: &dyn Fn(&str) -> String) -> Option<String> {
    let mut cur = Cursor::new(sig);
    let mut out = String::with_capacity(sig.len());
    if cur.peek() == Some(b'<') {
        copy_type_params(&mut cur, &mut out, map)?;
    }
    copy_class_type(&mut cur, &mut out, map)?;
    while !cur.done() {
        copy_class_type(&mut cur, &mut out, map)?;
    }
    Some(out)
}

pub fn rewrite_method_signature(sig: &str, map: &dyn Fn(&str) -> String) -> Option<String> {
    let mut cur = Cursor::new(sig);
    let mut out = String::with_capacity(sig.len());
    if cur.peek() == Some(b'<') {
        copy_type_params(&mut cur, &mut out, map)?;
    }
    cur.expect(b'(')?;
    out.push('(');
    while cur.peek() != Some(b')') {
        copy_type_signature(&mut cur, &mut out, map)?;
    }
    cur.expect(b')')?;
    out.push(')');
    if cur.peek() == Some(b'V') {
        cur.bump();
        out.push('V');
    } else {
        copy_type_signature(&mut cur, &mut out, map)?;
    }
    while cur.peek() == Some(b'^') {
        cur.bump();
        out.push('^');
        if cur.peek() == Some(b'T') {
            copy_type_variable(&mut cur, &mut out)?;
        } else {
            copy_class_type(&mut cur, &mut out, map)?;
        }
    }
    cur.done().then_some(out)
}

pub fn rewrite_field_signature(sig: &str, map: &dyn Fn(&str) -> String) -> Option<String> {
    let mut cur = Cursor::new(sig);
    let mut out = String::with_capacity(sig.len());
    copy_field_type(&mut cur, &mut out, map)?;
    cur.done().then_some(out)
}

fn copy_type_params(
    cur: &mut Cursor<'_>,
    out: &mut String,
    map: &dyn Fn(&str) -> String,
) -> Option<()> {
    cur.expect(b'<')?;
    out.push('<');
    while cur.peek() != Some(b'>') {
        let name = cur.until(&[b':'])?;
        out.push_str(name);
        cur.expect(b':')?;
        out.push(':');
        // The class bound may be empty.
        if matches!(cur.peek(), Some(b'L' | b'[' | b'T')) {
            copy_field_type(cur, out, map)?;
        }
        while cur.peek() == Some(b':') {
            cur.bump();
            out.push(':');
            copy_field_type(cur, out, map)?;
        }
    }
    cur.expect(b'>')?;
    out.push('>');
    Some(())
}

fn copy_type_signature(
    cur: &mut Cursor<'_>,
    out: &mut String,
    map: &dyn Fn(&str) -> String,
) -> Option<()> {
    match cur.peek()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {
            out.push(cur.bump()? as char);
            Some(())
        }
        _ => copy_field_type(cur, out, map),
    }
}

fn copy_field_type(
    cur: &mut Cursor<'_>,
    out: &mut String,
    map: &dyn Fn(&str) -> String,
) -> Option<()> {
    match cur.peek()? {
        b'L' => copy_class_type(cur, out, map),
        b'T' => copy_type_variable(cur, out),
        b'[' => {
            cur.bump();
            out.push('[');
            copy_type_signature(cur, out, map)
        }
        _ => None,
    }
}

fn copy_type_variable(cur: &mut Cursor<'_>, out: &mut String) -> Option<()> {
    cur.expect(b'T')?;
    out.push('T');
    let name = cur.until(&[b';'])?;
    out.push_str(name);
    cur.expect(b';')?;
    out.push(';');
    Some(())
}

fn copy_class_type(
    cur: &mut Cursor<'_>,
    out: &mut String,
    map: &dyn Fn(&str) -> String,
) -> Option<()> {
    cur.expect(b'L')?;
    let base = cur.until(&[b'<', b';', b'.'])?;
    out.push('L');
    out.push_str(&map(base));
    if cur.peek() == Some(b'<') {
        copy_type_args(cur, out, map)?;
    }
    while cur.peek() == Some(b'.') {
        cur.bump();
        out.push('.');
        let simple = cur.until(&[b'<', b';', b'.'])?;
        out.push_str(simple);
        if cur.peek() == Some(b'<') {
            copy_type_args(cur, out, map)?;
        }
    }
    cur.expect(b';')?;
    out.push(';');
    Some(())
}

fn copy_type_args(
    cur: &mut Cursor<'_>,
    out: &mut String,
    map: &dyn Fn(&str) -> String,
) -> Option<()> {
    cur.expect(b'<')?;
    out.push('<');
    while cur.peek() != Some(b'>') {
        match cur.peek()? {
            b'*' => {
                cur.bump();
                out.push('*');
            }
            b'+' | b'-' => {
                out.push(cur.bump()? as char);
                copy_field_type(cur, out, map)?;
            }
            _ => copy_field_type(cur, out, map)?,
        }
    }
    cur.expect(b'>')?;
    out.push('>');
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(name: &str) -> String {
        if let Some(rest) = name.strip_prefix("org/foo/") {
            format!("shaded/org/foo/{rest}")
        } else {
            name.to_string()
        }
    }

    #[test]
    fn plain_field_signature() {
        assert_eq!(
            rewrite_field_signature("Lorg/foo/Box;", &map).unwrap(),
            "Lshaded/org/foo/Box;"
        );
    }

    #[test]
    fn nested_type_arguments_are_rewritten() {
        assert_eq!(
            rewrite_field_signature("Ljava/util/Map<Lorg/foo/Key;Ljava/util/List<Lorg/foo/Val;>;>;", &map)
                .unwrap(),
            "Ljava/util/Map<Lshaded/org/foo/Key;Ljava/util/List<Lshaded/org/foo/Val;>;>;"
        );
    }

    #[test]
    fn wildcards_and_arrays() {
        assert_eq!(
            rewrite_field_signature("Ljava/util/List<+Lorg/foo/Bar;>;", &map).unwrap(),
            "Ljava/util/List<+Lshaded/org/foo/Bar;>;"
        );
        assert_eq!(
            rewrite_field_signature("[Lorg/foo/Bar;", &map).unwrap(),
            "[Lshaded/org/foo/Bar;"
        );
        assert_eq!(
            rewrite_field_signature("Ljava/util/List<*>;", &map).unwrap(),
            "Ljava/util/List<*>;"
        );
    }

    #[test]
    fn class_signature_with_type_params() {
        let sig = "<T:Lorg/foo/Base;:Lorg/foo/Marker;>Lorg/foo/Super<TT;>;Ljava/io/Serializable;";
        assert_eq!(
            rewrite_class_signature(sig, &map).unwrap(),
            "<T:Lshaded/org/foo/Base;:Lshaded/org/foo/Marker;>Lshaded/org/foo/Super<TT;>;Ljava/io/Serializable;"
        );
    }

    #[test]
    fn empty_class_bound_is_accepted() {
        let sig = "<T::Lorg/foo/Marker;>Ljava/lang/Object;";
        assert_eq!(
            rewrite_class_signature(sig, &map).unwrap(),
            "<T::Lshaded/org/foo/Marker;>Ljava/lang/Object;"
        );
    }

    #[test]
    fn method_signature_with_throws() {
        let sig = "<X:Ljava/lang/Object;>(Lorg/foo/In;I)Lorg/foo/Out;^Lorg/foo/Oops;^TX;";
        assert_eq!(
            rewrite_method_signature(sig, &map).unwrap(),
            "<X:Ljava/lang/Object;>(Lshaded/org/foo/In;I)Lshaded/org/foo/Out;^Lshaded/org/foo/Oops;^TX;"
        );
    }

    #[test]
    fn inner_class_suffixes_keep_their_simple_names() {
        assert_eq!(
            rewrite_field_signature("Lorg/foo/Outer<TT;>.Inner<TU;>;", &map).unwrap(),
            "Lshaded/org/foo/Outer<TT;>.Inner<TU;>;"
        );
    }

    #[test]
    fn malformed_signatures_are_refused() {
        assert!(rewrite_field_signature("Lorg/foo/Missing", &map).is_none());
        assert!(rewrite_class_signature("<T>Lorg/foo/X;", &map).is_none());
        assert!(rewrite_method_signature("(I)", &map).is_none());
        assert!(rewrite_field_signature("Q", &map).is_none());
    }
}
