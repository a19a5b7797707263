//! Constant-pool driven class remapping.
//!
//! Every name-bearing site in a class file resolves through the constant
//! pool, so rewriting pool entries covers superclasses, interfaces, field
//! and method references, `new`/`checkcast`/`instanceof` operands, `ldc`
//! class and string constants, descriptors and generic signatures in one
//! pass. Pool indices are never reassigned, which keeps `Code` payloads
//! and every other opaque attribute valid without decoding them.
//!
//! A Utf8 entry can serve several roles at once (a class name that is also
//! a string constant, say). Entries are rewritten in place only when every
//! referencing role agrees on the new text; otherwise the changed sites are
//! repointed to a freshly interned Utf8 and the original is left for the
//! remaining referents.

use std::collections::{HashMap, HashSet};

use super::model::{Attribute, Class};
use super::pool::Const;
use super::{descriptor, signature, ClassError};

const SIGNATURE_ATTR: &[u8] = b"Signature";

pub struct RemapOutcome {
    pub bytes: Vec<u8>,
    pub changed: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SigKind {
    Class = 0,
    Method = 1,
    Field = 2,
}

const SIG_KINDS: [SigKind; 3] = [SigKind::Class, SigKind::Method, SigKind::Field];

#[derive(Default, Clone)]
struct Census {
    class_name: u32,
    descriptor: u32,
    string: u32,
    signature: [u32; 3],
    other: u32,
}

impl Census {
    fn has_roles(&self) -> bool {
        self.class_name > 0
            || self.descriptor > 0
            || self.string > 0
            || self.signature.iter().any(|&n| n > 0)
    }
}

#[derive(Default)]
struct Rewrite {
    class_name: Option<String>,
    descriptor: Option<String>,
    string: Option<String>,
    signature: [Option<String>; 3],
}

impl Rewrite {
    fn changed_values(&self) -> Vec<&str> {
        let mut values: Vec<&str> = Vec::new();
        values.extend(self.class_name.as_deref());
        values.extend(self.descriptor.as_deref());
        values.extend(self.string.as_deref());
        for sig in &self.signature {
            values.extend(sig.as_deref());
        }
        values
    }

    fn is_empty(&self) -> bool {
        self.changed_values().is_empty()
    }
}

/// Remaps one class. `map_name` receives internal and dotted names,
/// `map_string` receives string constants. Returns the input bytes
/// untouched when nothing matched.
pub fn remap_class(
    bytes: &[u8],
    map_name: &dyn Fn(&str) -> String,
    map_string: &dyn Fn(&str) -> String,
) -> Result<RemapOutcome, ClassError> {
    let mut class = Class::parse(bytes)?;
    let mut warnings = Vec::new();

    let signature_names: HashSet<u16> = class
        .pool
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Const::Utf8(b) if b.as_slice() == SIGNATURE_ATTR))
        .map(|(i, _)| i as u16)
        .collect();

    let census = take_census(&class, &signature_names);

    let mut rewrites: Vec<(u16, Rewrite)> = Vec::new();
    for (idx, tally) in census.iter().enumerate() {
        if !tally.has_roles() {
            continue;
        }
        let idx = idx as u16;
        let Some(text) = class.pool.utf8_str(idx) else {
            continue;
        };
        let mut rewrite = Rewrite::default();
        if tally.class_name > 0 {
            rewrite.class_name = Some(map_name(text)).filter(|n| n != text);
        }
        if tally.descriptor > 0 {
            let rewritten = if text.starts_with('(') {
                descriptor::rewrite_method_descriptor(text, map_name)
            } else {
                descriptor::rewrite_field_descriptor(text, map_name)
            };
            match rewritten {
                Some(new) => rewrite.descriptor = Some(new).filter(|n| n != text),
                None => warnings.push(format!("unparseable descriptor `{text}` left unchanged")),
            }
        }
        if tally.string > 0 {
            rewrite.string = Some(map_string(text)).filter(|n| n != text);
        }
        for kind in SIG_KINDS {
            if tally.signature[kind as usize] == 0 {
                continue;
            }
            let rewritten = match kind {
                SigKind::Class => signature::rewrite_class_signature(text, map_name),
                SigKind::Method => signature::rewrite_method_signature(text, map_name),
                SigKind::Field => signature::rewrite_field_signature(text, map_name),
            };
            match rewritten {
                Some(new) => {
                    rewrite.signature[kind as usize] = Some(new).filter(|n| n != text);
                }
                None => warnings.push(format!("unparseable signature `{text}` left unchanged")),
            }
        }
        if !rewrite.is_empty() {
            rewrites.push((idx, rewrite));
        }
    }

    if rewrites.is_empty() {
        return Ok(RemapOutcome {
            bytes: bytes.to_vec(),
            changed: false,
            warnings,
        });
    }

    // Phase one: in-place rewrites for entries whose referents all agree.
    let mut deferred: Vec<(u16, Rewrite)> = Vec::new();
    for (idx, rewrite) in rewrites {
        let tally = &census[idx as usize];
        let values = rewrite.changed_values();
        let unanimous = values.windows(2).all(|w| w[0] == w[1]);
        let role_left_behind = (tally.class_name > 0 && rewrite.class_name.is_none())
            || (tally.descriptor > 0 && rewrite.descriptor.is_none())
            || (tally.string > 0 && rewrite.string.is_none())
            || SIG_KINDS
                .iter()
                .any(|&k| tally.signature[k as usize] > 0 && rewrite.signature[k as usize].is_none());
        if tally.other == 0 && unanimous && !role_left_behind {
            let new = values[0].as_bytes().to_vec();
            class.pool.0[idx as usize] = Const::Utf8(new);
        } else {
            deferred.push((idx, rewrite));
        }
    }

    // Phase two: intern new Utf8s and repoint only the changed sites.
    let mut interned: HashMap<Vec<u8>, u16> = HashMap::new();
    for (i, entry) in class.pool.entries().iter().enumerate() {
        if let Const::Utf8(bytes) = entry {
            interned.entry(bytes.clone()).or_insert(i as u16);
        }
    }
    let mut repoint_class: HashMap<u16, u16> = HashMap::new();
    let mut repoint_descriptor: HashMap<u16, u16> = HashMap::new();
    let mut repoint_string: HashMap<u16, u16> = HashMap::new();
    let mut repoint_signature: HashMap<(u16, SigKind), u16> = HashMap::new();
    for (idx, rewrite) in deferred {
        let mut intern = |value: &str| -> Option<u16> {
            if let Some(&existing) = interned.get(value.as_bytes()) {
                return Some(existing);
            }
            match class.pool.push(Const::Utf8(value.as_bytes().to_vec())) {
                Ok(new_idx) => {
                    interned.insert(value.as_bytes().to_vec(), new_idx);
                    Some(new_idx)
                }
                Err(_) => {
                    warnings.push(format!(
                        "constant pool full, `{value}` left unrelocated"
                    ));
                    None
                }
            }
        };
        if let Some(new) = rewrite.class_name.as_deref().and_then(&mut intern) {
            repoint_class.insert(idx, new);
        }
        if let Some(new) = rewrite.descriptor.as_deref().and_then(&mut intern) {
            repoint_descriptor.insert(idx, new);
        }
        if let Some(new) = rewrite.string.as_deref().and_then(&mut intern) {
            repoint_string.insert(idx, new);
        }
        for kind in SIG_KINDS {
            if let Some(new) = rewrite.signature[kind as usize]
                .as_deref()
                .and_then(&mut intern)
            {
                repoint_signature.insert((idx, kind), new);
            }
        }
    }

    for entry in class.pool.0.iter_mut() {
        match entry {
            Const::Class(name) => repoint(name, &repoint_class),
            Const::Str(utf8) => repoint(utf8, &repoint_string),
            Const::NameAndType { descriptor, .. } => repoint(descriptor, &repoint_descriptor),
            Const::MethodType(descriptor) => repoint(descriptor, &repoint_descriptor),
            _ => {}
        }
    }
    for member in class.fields.iter_mut() {
        repoint(&mut member.descriptor, &repoint_descriptor);
        repoint_signature_attrs(
            &mut member.attributes,
            &signature_names,
            &repoint_signature,
            SigKind::Field,
        );
    }
    for member in class.methods.iter_mut() {
        repoint(&mut member.descriptor, &repoint_descriptor);
        repoint_signature_attrs(
            &mut member.attributes,
            &signature_names,
            &repoint_signature,
            SigKind::Method,
        );
    }
    repoint_signature_attrs(
        &mut class.attributes,
        &signature_names,
        &repoint_signature,
        SigKind::Class,
    );

    Ok(RemapOutcome {
        bytes: class.to_bytes()?,
        changed: true,
        warnings,
    })
}

fn repoint(slot: &mut u16, map: &HashMap<u16, u16>) {
    if let Some(&new) = map.get(slot) {
        *slot = new;
    }
}

fn signature_payload(attr: &Attribute, signature_names: &HashSet<u16>) -> Option<u16> {
    if signature_names.contains(&attr.name) && attr.data.len() == 2 {
        Some(u16::from_be_bytes([attr.data[0], attr.data[1]]))
    } else {
        None
    }
}

fn repoint_signature_attrs(
    attributes: &mut [Attribute],
    signature_names: &HashSet<u16>,
    map: &HashMap<(u16, SigKind), u16>,
    kind: SigKind,
) {
    for attr in attributes {
        if let Some(idx) = signature_payload(attr, signature_names) {
            if let Some(&new) = map.get(&(idx, kind)) {
                attr.data = new.to_be_bytes().to_vec();
            }
        }
    }
}

fn take_census(class: &Class, signature_names: &HashSet<u16>) -> Vec<Census> {
    let mut census = vec![Census::default(); class.pool.entries().len()];

    // Dangling indices in a malformed pool are simply not counted; the
    // class serializes back as it came in.
    fn tally(census: &mut [Census], idx: u16, bump: impl FnOnce(&mut Census)) {
        if let Some(slot) = census.get_mut(idx as usize) {
            bump(slot);
        }
    }

    for entry in class.pool.entries() {
        match entry {
            Const::Class(name) => tally(&mut census, *name, |c| c.class_name += 1),
            Const::Str(utf8) => tally(&mut census, *utf8, |c| c.string += 1),
            Const::NameAndType { name, descriptor } => {
                tally(&mut census, *name, |c| c.other += 1);
                tally(&mut census, *descriptor, |c| c.descriptor += 1);
            }
            Const::MethodType(descriptor) => {
                tally(&mut census, *descriptor, |c| c.descriptor += 1)
            }
            Const::Module(name) | Const::Package(name) => {
                tally(&mut census, *name, |c| c.other += 1)
            }
            _ => {}
        }
    }

    let note_attrs = |census: &mut [Census], attrs: &[Attribute], kind: SigKind| {
        for attr in attrs {
            tally(census, attr.name, |c| c.other += 1);
            if let Some(idx) = signature_payload(attr, signature_names) {
                tally(census, idx, |c| c.signature[kind as usize] += 1);
            }
        }
    };

    for member in &class.fields {
        tally(&mut census, member.name, |c| c.other += 1);
        tally(&mut census, member.descriptor, |c| c.descriptor += 1);
        note_attrs(&mut census, &member.attributes, SigKind::Field);
    }
    for member in &class.methods {
        tally(&mut census, member.name, |c| c.other += 1);
        tally(&mut census, member.descriptor, |c| c.descriptor += 1);
        note_attrs(&mut census, &member.attributes, SigKind::Method);
    }
    note_attrs(&mut census, &class.attributes, SigKind::Class);

    census
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::model::{Attribute, Class, Member};
    use crate::classfile::pool::{Const, ConstPool};

    fn map_name(name: &str) -> String {
        let dotted = name.replace('.', "/");
        if let Some(rest) = dotted.strip_prefix("org/foo") {
            let mapped = format!("shaded/org/foo{rest}");
            if name.contains('.') {
                return mapped.replace('/', ".");
            }
            return mapped;
        }
        name.to_string()
    }

    fn build_class() -> Class {
        let mut pool = ConstPool(vec![Const::Phantom]);
        let this_name = pool.push(Const::Utf8(b"a/b/C".to_vec())).unwrap();
        let this_class = pool.push(Const::Class(this_name)).unwrap();
        let super_name = pool.push(Const::Utf8(b"org/foo/Base".to_vec())).unwrap();
        let super_class = pool.push(Const::Class(super_name)).unwrap();
        Class {
            minor: 0,
            major: 52,
            pool,
            access: 0x0021,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn superclass_is_remapped_and_own_name_kept() {
        let bytes = build_class().to_bytes().unwrap();
        let outcome = remap_class(&bytes, &map_name, &map_name).unwrap();
        assert!(outcome.changed);
        let parsed = Class::parse(&outcome.bytes).unwrap();
        assert_eq!(parsed.pool.class_name(parsed.this_class), Some("a/b/C"));
        assert_eq!(
            parsed.pool.class_name(parsed.super_class),
            Some("shaded/org/foo/Base")
        );
    }

    #[test]
    fn untouched_class_returns_input_bytes() {
        let mut class = build_class();
        // Point the superclass at an unrelated package.
        let name = class.pool.push(Const::Utf8(b"java/lang/Object".to_vec())).unwrap();
        let entry = class.pool.push(Const::Class(name)).unwrap();
        class.super_class = entry;
        class.pool.0[3] = Const::Utf8(b"java/lang/Object".to_vec());
        let bytes = class.to_bytes().unwrap();
        let outcome = remap_class(&bytes, &map_name, &map_name).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.bytes, bytes);
    }

    #[test]
    fn member_descriptors_are_rewritten() {
        let mut class = build_class();
        let field_name = class.pool.push(Const::Utf8(b"delegate".to_vec())).unwrap();
        let field_desc = class
            .pool
            .push(Const::Utf8(b"Lorg/foo/Bar;".to_vec()))
            .unwrap();
        class.fields.push(Member {
            access: 0x0002,
            name: field_name,
            descriptor: field_desc,
            attributes: Vec::new(),
        });
        let bytes = class.to_bytes().unwrap();
        let outcome = remap_class(&bytes, &map_name, &map_name).unwrap();
        let parsed = Class::parse(&outcome.bytes).unwrap();
        assert_eq!(
            parsed.pool.utf8_str(parsed.fields[0].descriptor),
            Some("Lshaded/org/foo/Bar;")
        );
    }

    #[test]
    fn string_constants_follow_relocation() {
        let mut class = build_class();
        let literal = class
            .pool
            .push(Const::Utf8(b"org.foo.Bar".to_vec()))
            .unwrap();
        class.pool.push(Const::Str(literal)).unwrap();
        let bytes = class.to_bytes().unwrap();
        let outcome = remap_class(&bytes, &map_name, &map_name).unwrap();
        let parsed = Class::parse(&outcome.bytes).unwrap();
        let strings: Vec<&str> = parsed
            .pool
            .entries()
            .iter()
            .filter_map(|e| match e {
                Const::Str(u) => parsed.pool.utf8_str(*u),
                _ => None,
            })
            .collect();
        assert_eq!(strings, vec!["shaded.org.foo.Bar"]);
    }

    #[test]
    fn shared_utf8_is_split_not_clobbered() {
        // One Utf8 used both as a class name and as a member name: the class
        // reference must move to the new text, the member name must stay.
        let mut class = build_class();
        let shared = class.pool.push(Const::Utf8(b"org/foo/Bar".to_vec())).unwrap();
        let class_ref = class.pool.push(Const::Class(shared)).unwrap();
        let desc = class.pool.push(Const::Utf8(b"I".to_vec())).unwrap();
        class.interfaces.push(class_ref);
        class.fields.push(Member {
            access: 0,
            name: shared,
            descriptor: desc,
            attributes: Vec::new(),
        });
        let bytes = class.to_bytes().unwrap();
        let outcome = remap_class(&bytes, &map_name, &map_name).unwrap();
        let parsed = Class::parse(&outcome.bytes).unwrap();
        assert_eq!(
            parsed.pool.class_name(parsed.interfaces[0]),
            Some("shaded/org/foo/Bar")
        );
        assert_eq!(parsed.pool.utf8_str(parsed.fields[0].name), Some("org/foo/Bar"));
    }

    #[test]
    fn signature_attribute_is_rewritten() {
        let mut class = build_class();
        let attr_name = class
            .pool
            .push(Const::Utf8(SIGNATURE_ATTR.to_vec()))
            .unwrap();
        let sig = class
            .pool
            .push(Const::Utf8(b"Ljava/util/List<Lorg/foo/Bar;>;".to_vec()))
            .unwrap();
        let field_name = class.pool.push(Const::Utf8(b"items".to_vec())).unwrap();
        let field_desc = class
            .pool
            .push(Const::Utf8(b"Ljava/util/List;".to_vec()))
            .unwrap();
        class.fields.push(Member {
            access: 0,
            name: field_name,
            descriptor: field_desc,
            attributes: vec![Attribute {
                name: attr_name,
                data: sig.to_be_bytes().to_vec(),
            }],
        });
        let bytes = class.to_bytes().unwrap();
        let outcome = remap_class(&bytes, &map_name, &map_name).unwrap();
        let parsed = Class::parse(&outcome.bytes).unwrap();
        let attr = &parsed.fields[0].attributes[0];
        let idx = u16::from_be_bytes([attr.data[0], attr.data[1]]);
        assert_eq!(
            parsed.pool.utf8_str(idx),
            Some("Ljava/util/List<Lshaded/org/foo/Bar;>;")
        );
    }

    #[test]
    fn unparseable_signature_warns_and_survives() {
        let mut class = build_class();
        let attr_name = class
            .pool
            .push(Const::Utf8(SIGNATURE_ATTR.to_vec()))
            .unwrap();
        let sig = class
            .pool
            .push(Const::Utf8(b"Lorg/foo/Broken".to_vec()))
            .unwrap();
        class.attributes.push(Attribute {
            name: attr_name,
            data: sig.to_be_bytes().to_vec(),
        });
        let bytes = class.to_bytes().unwrap();
        let outcome = remap_class(&bytes, &map_name, &map_name).unwrap();
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("unparseable signature")));
        let parsed = Class::parse(&outcome.bytes).unwrap();
        assert_eq!(parsed.pool.utf8_str(sig), Some("Lorg/foo/Broken"));
    }

    #[test]
    fn code_attribute_bytes_survive_untouched() {
        let mut class = build_class();
        let code_name = class.pool.push(Const::Utf8(b"Code".to_vec())).unwrap();
        let method_name = class.pool.push(Const::Utf8(b"run".to_vec())).unwrap();
        let method_desc = class.pool.push(Const::Utf8(b"()V".to_vec())).unwrap();
        let payload = vec![0, 2, 0, 1, 0, 0, 0, 1, 0xB1, 0, 0, 0, 0];
        class.methods.push(Member {
            access: 0x0001,
            name: method_name,
            descriptor: method_desc,
            attributes: vec![Attribute {
                name: code_name,
                data: payload.clone(),
            }],
        });
        let bytes = class.to_bytes().unwrap();
        let outcome = remap_class(&bytes, &map_name, &map_name).unwrap();
        let parsed = Class::parse(&outcome.bytes).unwrap();
        assert_eq!(parsed.methods[0].attributes[0].data, payload);
    }
}
