/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! Schema-less structure codec
//!
//! A command or response body is described by an ordered list of typed
//! entries. Nothing but the order and the entry kind determines the layout:
//! scalars are written big-endian, arrays verbatim, composites through their
//! [`TpmStructure`] impl. Variable-length data is annotated per entry with one
//! of two policies:
//!
//! * explicit length prefix ([`Field::Sized`], [`Field::SizedStruct`]): a u32
//!   byte count precedes the data, so later fields can still be located;
//! * remainder absorption ([`Field::Remainder`]): the entry takes every byte
//!   not claimed by the fixed-size entries around it.
//!
//! A single list may use one policy or the other, never both.

use crate::error::{Result, TpmError};
use crate::tpm_buffer::TpmBuffer;

/// Trait for structures that can be marshaled to/from TPM wire format
pub trait TpmStructure {
    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()>;
    fn deserialize(&mut self, buffer: &mut TpmBuffer) -> Result<()>;

    /// Wire size when it does not depend on the field values
    fn fixed_size(&self) -> Option<usize> {
        None
    }

    /// Size of the marshaled form
    fn wire_size(&self) -> Result<usize> {
        if let Some(size) = self.fixed_size() {
            return Ok(size);
        }
        let mut buffer = TpmBuffer::new();
        self.serialize(&mut buffer)?;
        Ok(buffer.len())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = TpmBuffer::new();
        self.serialize(&mut buffer)?;
        Ok(buffer.into_bytes())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self>
    where
        Self: Default + Sized,
    {
        let mut value = Self::default();
        let mut buffer = TpmBuffer::from_bytes(bytes);
        value.deserialize(&mut buffer)?;
        Ok(value)
    }
}

/// How an entry's length is determined on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthPolicy {
    Intrinsic,
    Prefixed,
    Remainder,
}

/// Outbound codec entry
pub enum Field<'a> {
    U8(u8),
    U16(u16),
    U32(u32),
    Bool(bool),
    /// Fixed-size block copied verbatim
    Array(&'a [u8]),
    /// Nested composite
    Struct(&'a dyn TpmStructure),
    /// u32 length prefix, then the bytes
    Sized(&'a [u8]),
    /// u32 length prefix computed from the composite, then the composite
    SizedStruct(&'a dyn TpmStructure),
    /// Trailing bytes with no prefix
    Remainder(&'a [u8]),
}

impl Field<'_> {
    fn policy(&self) -> LengthPolicy {
        match self {
            Field::Sized(_) | Field::SizedStruct(_) => LengthPolicy::Prefixed,
            Field::Remainder(_) => LengthPolicy::Remainder,
            _ => LengthPolicy::Intrinsic,
        }
    }

    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Field::U8(_) | Field::Bool(_) => Some(1),
            Field::U16(_) => Some(2),
            Field::U32(_) => Some(4),
            Field::Array(a) => Some(a.len()),
            Field::Struct(s) => s.fixed_size(),
            Field::Sized(_) | Field::SizedStruct(_) | Field::Remainder(_) => None,
        }
    }

    fn serialize(&self, buffer: &mut TpmBuffer) -> Result<()> {
        match self {
            Field::U8(v) => buffer.write_u8(*v),
            Field::U16(v) => buffer.write_u16(*v),
            Field::U32(v) => buffer.write_u32(*v),
            Field::Bool(v) => buffer.write_u8(*v as u8),
            Field::Array(a) | Field::Remainder(a) => buffer.write_bytes(a),
            Field::Struct(s) => s.serialize(buffer)?,
            Field::Sized(a) => buffer.write_sized(a)?,
            Field::SizedStruct(s) => {
                let size = s.wire_size()?;
                let size = u32::try_from(size).map_err(|_| {
                    TpmError::BufferOverflow(format!("structure of {} bytes does not fit a u32 size prefix", size))
                })?;
                buffer.write_u32(size);
                s.serialize(buffer)?;
            }
        }
        Ok(())
    }
}

/// Inbound codec entry, decoded in place
pub enum FieldMut<'a> {
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    Bool(&'a mut bool),
    Array(&'a mut [u8]),
    Struct(&'a mut dyn TpmStructure),
    Sized(&'a mut Vec<u8>),
    SizedStruct(&'a mut dyn TpmStructure),
    Remainder(&'a mut Vec<u8>),
}

impl FieldMut<'_> {
    fn policy(&self) -> LengthPolicy {
        match self {
            FieldMut::Sized(_) | FieldMut::SizedStruct(_) => LengthPolicy::Prefixed,
            FieldMut::Remainder(_) => LengthPolicy::Remainder,
            _ => LengthPolicy::Intrinsic,
        }
    }

    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            FieldMut::U8(_) | FieldMut::Bool(_) => Some(1),
            FieldMut::U16(_) => Some(2),
            FieldMut::U32(_) => Some(4),
            FieldMut::Array(a) => Some(a.len()),
            FieldMut::Struct(s) => s.fixed_size(),
            FieldMut::Sized(_) | FieldMut::SizedStruct(_) | FieldMut::Remainder(_) => None,
        }
    }

    fn deserialize(&mut self, buffer: &mut TpmBuffer, trailing: usize) -> Result<()> {
        match self {
            FieldMut::U8(v) => **v = buffer.read_u8()?,
            FieldMut::U16(v) => **v = buffer.read_u16()?,
            FieldMut::U32(v) => **v = buffer.read_u32()?,
            FieldMut::Bool(v) => **v = buffer.read_u8()? != 0,
            FieldMut::Array(a) => buffer.read_into(a)?,
            FieldMut::Struct(s) => s.deserialize(buffer)?,
            FieldMut::Sized(v) => **v = buffer.read_sized()?,
            FieldMut::SizedStruct(s) => {
                let bytes = buffer.read_sized()?;
                let mut inner = TpmBuffer::from_bytes(&bytes);
                s.deserialize(&mut inner)?;
                if inner.remaining() != 0 {
                    return Err(TpmError::InvalidLayout(format!(
                        "sized structure left {} of {} declared bytes unread",
                        inner.remaining(),
                        bytes.len()
                    )));
                }
            }
            FieldMut::Remainder(v) => {
                if buffer.remaining() < trailing {
                    return Err(TpmError::BufferUnderflow {
                        needed: trailing,
                        remaining: buffer.remaining(),
                    });
                }
                **v = buffer.read_bytes(buffer.remaining() - trailing)?;
            }
        }
        Ok(())
    }
}

fn check_layout(entries: &[(LengthPolicy, Option<usize>)]) -> Result<()> {
    let prefixed = entries.iter().any(|(p, _)| *p == LengthPolicy::Prefixed);
    let remainders = entries.iter().filter(|(p, _)| *p == LengthPolicy::Remainder).count();

    if prefixed && remainders > 0 {
        return Err(TpmError::InvalidLayout(
            "length-prefixed and remainder fields cannot share a field list".to_string(),
        ));
    }
    if remainders > 1 {
        return Err(TpmError::InvalidLayout("more than one remainder field".to_string()));
    }
    if let Some(pos) = entries.iter().position(|(p, _)| *p == LengthPolicy::Remainder) {
        if entries[pos + 1..].iter().any(|(_, size)| size.is_none()) {
            return Err(TpmError::InvalidLayout(
                "only fixed-size fields may follow a remainder field".to_string(),
            ));
        }
    }
    Ok(())
}

/// Append the fields to `buffer` in order
pub fn serialize_into(buffer: &mut TpmBuffer, fields: &[Field]) -> Result<()> {
    let layout: Vec<_> = fields.iter().map(|f| (f.policy(), f.fixed_size())).collect();
    check_layout(&layout)?;
    for field in fields {
        field.serialize(buffer)?;
    }
    Ok(())
}

/// Marshal an ordered field list
pub fn serialize(fields: &[Field]) -> Result<Vec<u8>> {
    let mut buffer = TpmBuffer::new();
    serialize_into(&mut buffer, fields)?;
    Ok(buffer.into_bytes())
}

/// Unmarshal `bytes` into the targets, in order. Bytes beyond what the
/// targets consume are left alone.
pub fn deserialize(bytes: &[u8], fields: &mut [FieldMut]) -> Result<()> {
    let mut buffer = TpmBuffer::from_bytes(bytes);
    deserialize_from(&mut buffer, fields)
}

pub fn deserialize_from(buffer: &mut TpmBuffer, fields: &mut [FieldMut]) -> Result<()> {
    let layout: Vec<_> = fields.iter().map(|f| (f.policy(), f.fixed_size())).collect();
    check_layout(&layout)?;

    for (i, field) in fields.iter_mut().enumerate() {
        let trailing: usize = layout[i + 1..].iter().filter_map(|(_, size)| *size).sum();
        field.deserialize(buffer, trailing)?;
    }
    Ok(())
}
