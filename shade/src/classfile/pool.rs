use super::{ClassError, Reader};

/// One constant pool entry. Numeric constants keep their raw bit patterns,
/// `Utf8` keeps raw modified-UTF-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Const {
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class(u16),
    Str(u16),
    Field { class: u16, name_and_type: u16 },
    Method { class: u16, name_and_type: u16 },
    InterfaceMethod { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
    /// Slot 0 and the slot following a Long or Double. Serializes to nothing.
    Phantom,
}

/// The constant pool, indexed exactly as in the class file: entry 0 is a
/// phantom, Long and Double occupy two slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstPool(pub Vec<Const>);

impl ConstPool {
    pub(crate) fn parse(r: &mut Reader<'_>) -> Result<Self, ClassError> {
        let count = r.u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Const::Phantom);
        while entries.len() < count {
            let tag = r.u8()?;
            let entry = match tag {
                1 => {
                    let len = r.u16()? as usize;
                    Const::Utf8(r.take(len)?.to_vec())
                }
                3 => Const::Integer(r.u32()?),
                4 => Const::Float(r.u32()?),
                5 => Const::Long(r.u64()?),
                6 => Const::Double(r.u64()?),
                7 => Const::Class(r.u16()?),
                8 => Const::Str(r.u16()?),
                9 => Const::Field {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                10 => Const::Method {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                11 => Const::InterfaceMethod {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                12 => Const::NameAndType {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                15 => Const::MethodHandle {
                    kind: r.u8()?,
                    reference: r.u16()?,
                },
                16 => Const::MethodType(r.u16()?),
                17 => Const::Dynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                18 => Const::InvokeDynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                19 => Const::Module(r.u16()?),
                20 => Const::Package(r.u16()?),
                other => return Err(ClassError::BadTag(other)),
            };
            let wide = matches!(entry, Const::Long(_) | Const::Double(_));
            entries.push(entry);
            if wide {
                entries.push(Const::Phantom);
            }
        }
        Ok(Self(entries))
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassError> {
        let count = u16::try_from(self.0.len()).map_err(|_| ClassError::PoolOverflow)?;
        out.extend_from_slice(&count.to_be_bytes());
        for entry in &self.0 {
            match entry {
                Const::Utf8(bytes) => {
                    out.push(1);
                    let len = u16::try_from(bytes.len()).map_err(|_| ClassError::PoolOverflow)?;
                    out.extend_from_slice(&len.to_be_bytes());
                    out.extend_from_slice(bytes);
                }
                Const::Integer(bits) => {
                    out.push(3);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                Const::Float(bits) => {
                    out.push(4);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                Const::Long(bits) => {
                    out.push(5);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                Const::Double(bits) => {
                    out.push(6);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                Const::Class(idx) => write_ref(out, 7, *idx),
                Const::Str(idx) => write_ref(out, 8, *idx),
                Const::Field {
                    class,
                    name_and_type,
                } => write_pair(out, 9, *class, *name_and_type),
                Const::Method {
                    class,
                    name_and_type,
                } => write_pair(out, 10, *class, *name_and_type),
                Const::InterfaceMethod {
                    class,
                    name_and_type,
                } => write_pair(out, 11, *class, *name_and_type),
                Const::NameAndType { name, descriptor } => write_pair(out, 12, *name, *descriptor),
                Const::MethodHandle { kind, reference } => {
                    out.push(15);
                    out.push(*kind);
                    out.extend_from_slice(&reference.to_be_bytes());
                }
                Const::MethodType(idx) => write_ref(out, 16, *idx),
                Const::Dynamic {
                    bootstrap,
                    name_and_type,
                } => write_pair(out, 17, *bootstrap, *name_and_type),
                Const::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => write_pair(out, 18, *bootstrap, *name_and_type),
                Const::Module(idx) => write_ref(out, 19, *idx),
                Const::Package(idx) => write_ref(out, 20, *idx),
                Const::Phantom => {}
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[Const] {
        &self.0
    }

    pub fn utf8(&self, index: u16) -> Option<&[u8]> {
        match self.0.get(index as usize) {
            Some(Const::Utf8(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn utf8_str(&self, index: u16) -> Option<&str> {
        std::str::from_utf8(self.utf8(index)?).ok()
    }

    /// Resolves the name behind a Class entry.
    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.0.get(index as usize) {
            Some(Const::Class(utf8)) => self.utf8_str(*utf8),
            _ => None,
        }
    }

    /// Appends an entry, returning its index.
    pub fn push(&mut self, entry: Const) -> Result<u16, ClassError> {
        let wide = matches!(entry, Const::Long(_) | Const::Double(_));
        let needed = if wide { 2 } else { 1 };
        let index = u16::try_from(self.0.len()).map_err(|_| ClassError::PoolOverflow)?;
        if self.0.len() + needed > u16::MAX as usize {
            return Err(ClassError::PoolOverflow);
        }
        self.0.push(entry);
        if wide {
            self.0.push(Const::Phantom);
        }
        Ok(index)
    }
}

fn write_ref(out: &mut Vec<u8>, tag: u8, idx: u16) {
    out.push(tag);
    out.extend_from_slice(&idx.to_be_bytes());
}

fn write_pair(out: &mut Vec<u8>, tag: u8, a: u16, b: u16) {
    out.push(tag);
    out.extend_from_slice(&a.to_be_bytes());
    out.extend_from_slice(&b.to_be_bytes());
}
