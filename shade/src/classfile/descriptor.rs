//! Field and method descriptor rewriting. Descriptors are re-emitted with
//! every `L<name>;` object type passed through the mapping function.

/// Rewrites a field descriptor, `None` when it does not parse.
pub fn rewrite_field_descriptor(desc: &str, map: &dyn Fn(&str) -> String) -> Option<String> {
    let mut out = String::with_capacity(desc.len());
    let bytes = desc.as_bytes();
    let mut pos = 0;
    copy_type(bytes, &mut pos, &mut out, map)?;
    (pos == bytes.len()).then_some(out)
}

/// Rewrites a method descriptor, `None` when it does not parse.
pub fn rewrite_method_descriptor(desc: &str, map: &dyn Fn(&str) -> String) -> Option<String> {
    let bytes = desc.as_bytes();
    let mut pos = 0;
    if bytes.first() != Some(&b'(') {
        return None;
    }
    pos += 1;
    let mut out = String::with_capacity(desc.len());
    out.push('(');
    while bytes.get(pos) != Some(&b')') {
        copy_type(bytes, &mut pos, &mut out, map)?;
    }
    pos += 1;
    out.push(')');
    if bytes.get(pos) == Some(&b'V') {
        pos += 1;
        out.push('V');
    } else {
        copy_type(bytes, &mut pos, &mut out, map)?;
    }
    (pos == bytes.len()).then_some(out)
}

fn copy_type(
    bytes: &[u8],
    pos: &mut usize,
    out: &mut String,
    map: &dyn Fn(&str) -> String,
) -> Option<()> {
    match bytes.get(*pos)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {
            out.push(bytes[*pos] as char);
            *pos += 1;
            Some(())
        }
        b'[' => {
            out.push('[');
            *pos += 1;
            copy_type(bytes, pos, out, map)
        }
        b'L' => {
            let start = *pos + 1;
            let end = start + bytes[start..].iter().position(|&b| b == b';')?;
            let name = std::str::from_utf8(&bytes[start..end]).ok()?;
            out.push('L');
            out.push_str(&map(name));
            out.push(';');
            *pos = end + 1;
            Some(())
        }
        _ => None,
    }
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
    fn field_object_type_is_rewritten() {
        assert_eq!(
            rewrite_field_descriptor("Lorg/foo/Bar;", &map).unwrap(),
            "Lshaded/org/foo/Bar;"
        );
    }

    #[test]
    fn array_dimensions_are_kept() {
        assert_eq!(
            rewrite_field_descriptor("[[Lorg/foo/Bar;", &map).unwrap(),
            "[[Lshaded/org/foo/Bar;"
        );
    }

    #[test]
    fn primitives_pass_through() {
        assert_eq!(rewrite_field_descriptor("J", &map).unwrap(), "J");
        assert_eq!(rewrite_field_descriptor("[I", &map).unwrap(), "[I");
    }

    #[test]
    fn method_descriptor_rewrites_all_positions() {
        assert_eq!(
            rewrite_method_descriptor("(ILorg/foo/Bar;[J)Lorg/foo/Baz;", &map).unwrap(),
            "(ILshaded/org/foo/Bar;[J)Lshaded/org/foo/Baz;"
        );
        assert_eq!(
            rewrite_method_descriptor("()V", &map).unwrap(),
            "()V"
        );
    }

    #[test]
    fn unrelated_types_are_untouched() {
        assert_eq!(
            rewrite_method_descriptor("(Ljava/lang/String;)V", &map).unwrap(),
            "(Ljava/lang/String;)V"
        );
    }

    #[test]
    fn malformed_descriptors_are_refused() {
        assert!(rewrite_field_descriptor("Lorg/foo/Bar", &map).is_none());
        assert!(rewrite_field_descriptor("X", &map).is_none());
        assert!(rewrite_field_descriptor("II", &map).is_none());
        assert!(rewrite_method_descriptor("(I", &map).is_none());
    }
}
