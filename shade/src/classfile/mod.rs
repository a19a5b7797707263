//! Minimal class-file model: enough structure to rewrite the constant pool
//! and the name-bearing attributes, while keeping code and all other
//! attribute payloads as opaque bytes.

pub mod descriptor;
pub mod model;
pub mod pool;
pub mod remap;
pub mod signature;

pub use model::{Attribute, Class, Member};
pub use pool::{Const, ConstPool};
pub use remap::{remap_class, RemapOutcome};

use thiserror::Error;

pub const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Error)]
pub enum ClassError {
    #[error("unexpected end of class file")]
    Truncated,
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unknown constant pool tag {0}")]
    BadTag(u8),
    #[error("trailing bytes after class structure")]
    TrailingBytes,
    #[error("constant pool overflow")]
    PoolOverflow,
}

/// Forward-only big-endian cursor over raw class bytes.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], ClassError> {
        let end = self.pos.checked_add(n).ok_or(ClassError::Truncated)?;
        if end > self.bytes.len() {
            return Err(ClassError::Truncated);
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ClassError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}
