/*
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the MIT License. See the LICENSE file in the project root for full license information.
 */

//! Big-endian byte buffer backing the structure codec

use crate::error::{Result, TpmError};

/// Growable output buffer with a read cursor
#[derive(Debug, Default, Clone)]
pub struct TpmBuffer {
    buffer: Vec<u8>,
    position: usize,
}

impl TpmBuffer {
    pub fn new() -> Self {
        TpmBuffer {
            buffer: Vec::new(),
            position: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        TpmBuffer {
            buffer: bytes.to_vec(),
            position: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Write a u32 length prefix followed by the bytes
    pub fn write_sized(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| {
            TpmError::BufferOverflow(format!("{} bytes do not fit a u32 size prefix", bytes.len()))
        })?;
        self.write_u32(len);
        self.write_bytes(bytes);
        Ok(())
    }

    /// Overwrite a u32 already written at `pos`
    pub fn patch_u32(&mut self, pos: usize, value: u32) -> Result<()> {
        let slot = self.buffer.get_mut(pos..pos + 4).ok_or_else(|| {
            TpmError::BufferOverflow(format!("cannot patch u32 at offset {}", pos))
        })?;
        slot.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        if self.remaining() < len {
            return Err(TpmError::BufferUnderflow {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.buffer[start..start + len])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.take(len)?.to_vec())
    }

    /// Fill `out` exactly from the buffer
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<()> {
        let b = self.take(out.len())?;
        out.copy_from_slice(b);
        Ok(())
    }

    /// Read a u32 length prefix and that many bytes
    pub fn read_sized(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Consume everything after the cursor
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let v = self.buffer[self.position.min(self.buffer.len())..].to_vec();
        self.position = self.buffer.len();
        v
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let mut buffer = TpmBuffer::new();
        buffer.write_u8(0x12);
        buffer.write_u16(0x3456);
        buffer.write_u32(0x789ABCDE);

        buffer.reset();

        assert_eq!(buffer.read_u8().unwrap(), 0x12);
        assert_eq!(buffer.read_u16().unwrap(), 0x3456);
        assert_eq!(buffer.read_u32().unwrap(), 0x789ABCDE);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut buffer = TpmBuffer::new();
        buffer.write_u16(0x00C1);
        buffer.write_u32(0x0000000A);
        assert_eq!(buffer.as_bytes(), &[0x00, 0xC1, 0x00, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn test_buffer_underflow() {
        let mut buffer = TpmBuffer::new();
        assert!(buffer.read_u8().is_err());

        let mut buffer = TpmBuffer::from_bytes(&[0x01, 0x02, 0x03]);
        match buffer.read_u32() {
            Err(TpmError::BufferUnderflow { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // a failed read does not move the cursor
        assert_eq!(buffer.position(), 0);
    }

    #[test]
    fn test_sized_and_patch() {
        let mut buffer = TpmBuffer::new();
        buffer.write_u32(0);
        buffer.write_sized(b"abc").unwrap();
        buffer.patch_u32(0, 0xDEADBEEF).unwrap();
        assert!(buffer.patch_u32(buffer.len() - 2, 1).is_err());

        buffer.reset();
        assert_eq!(buffer.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(buffer.read_sized().unwrap(), b"abc".to_vec());
        assert!(buffer.read_remaining().is_empty());
    }
}
