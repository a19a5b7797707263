use super::pool::ConstPool;
use super::{ClassError, Reader, MAGIC};

/// An attribute with its payload kept as raw bytes. Payload-internal
/// constant pool references stay valid because pool indices are never
/// reassigned during remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: u16,
    pub data: Vec<u8>,
}

/// A field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access: u16,
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub minor: u16,
    pub major: u16,
    pub pool: ConstPool,
    pub access: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

impl Class {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassError> {
        let mut r = Reader::new(bytes);
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassError::BadMagic(magic));
        }
        let minor = r.u16()?;
        let major = r.u16()?;
        let pool = ConstPool::parse(&mut r)?;
        let access = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;

        let interface_count = r.u16()? as usize;
        let mut interfaces = Vec::with_capacity(interface_count);
        for _ in 0..interface_count {
            interfaces.push(r.u16()?);
        }

        let fields = parse_members(&mut r)?;
        let methods = parse_members(&mut r)?;
        let attributes = parse_attributes(&mut r)?;
        if !r.is_empty() {
            return Err(ClassError::TrailingBytes);
        }

        Ok(Self {
            minor,
            major,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassError> {
        let mut out = Vec::with_capacity(1024);
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&self.minor.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        self.pool.write(&mut out)?;
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        write_count(&mut out, self.interfaces.len())?;
        for iface in &self.interfaces {
            out.extend_from_slice(&iface.to_be_bytes());
        }
        write_members(&mut out, &self.fields)?;
        write_members(&mut out, &self.methods)?;
        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }
}

fn parse_members(r: &mut Reader<'_>) -> Result<Vec<Member>, ClassError> {
    let count = r.u16()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        members.push(Member {
            access: r.u16()?,
            name: r.u16()?,
            descriptor: r.u16()?,
            attributes: parse_attributes(r)?,
        });
    }
    Ok(members)
}

fn parse_attributes(r: &mut Reader<'_>) -> Result<Vec<Attribute>, ClassError> {
    let count = r.u16()? as usize;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let name = r.u16()?;
        let len = r.u32()? as usize;
        attributes.push(Attribute {
            name,
            data: r.take(len)?.to_vec(),
        });
    }
    Ok(attributes)
}

fn write_members(out: &mut Vec<u8>, members: &[Member]) -> Result<(), ClassError> {
    write_count(out, members.len())?;
    for member in members {
        out.extend_from_slice(&member.access.to_be_bytes());
        out.extend_from_slice(&member.name.to_be_bytes());
        out.extend_from_slice(&member.descriptor.to_be_bytes());
        write_attributes(out, &member.attributes)?;
    }
    Ok(())
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) -> Result<(), ClassError> {
    write_count(out, attributes.len())?;
    for attr in attributes {
        out.extend_from_slice(&attr.name.to_be_bytes());
        let len = u32::try_from(attr.data.len()).map_err(|_| ClassError::PoolOverflow)?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&attr.data);
    }
    Ok(())
}

fn write_count(out: &mut Vec<u8>, count: usize) -> Result<(), ClassError> {
    let count = u16::try_from(count).map_err(|_| ClassError::PoolOverflow)?;
    out.extend_from_slice(&count.to_be_bytes());
    Ok(())
}
