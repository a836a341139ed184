use std::io::Write;

use crate::error::IoError;
use crate::tiff::ByteOrder;

/// Sequential output sink that tracks its position and byte order.
///
/// Directory saves are planned before any byte is written, so the sink never
/// needs to seek: the emit step pads forward to each planned offset.
pub struct TiffWriter<W: Write> {
    inner: W,
    byte_order: ByteOrder,
    position: u64,
}

impl<W: Write> TiffWriter<W> {
    /// Create a sink positioned at offset 0.
    pub fn new(inner: W, byte_order: ByteOrder) -> Self {
        Self {
            inner,
            byte_order,
            position: 0,
        }
    }

    /// Byte order used by the integer writers.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.inner
            .write_all(bytes)
            .map_err(|e| IoError::Write(e.to_string()))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), IoError> {
        self.write_bytes(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), IoError> {
        match self.byte_order {
            ByteOrder::LittleEndian => self.write_bytes(&value.to_le_bytes()),
            ByteOrder::BigEndian => self.write_bytes(&value.to_be_bytes()),
        }
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), IoError> {
        match self.byte_order {
            ByteOrder::LittleEndian => self.write_bytes(&value.to_le_bytes()),
            ByteOrder::BigEndian => self.write_bytes(&value.to_be_bytes()),
        }
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), IoError> {
        match self.byte_order {
            ByteOrder::LittleEndian => self.write_bytes(&value.to_le_bytes()),
            ByteOrder::BigEndian => self.write_bytes(&value.to_be_bytes()),
        }
    }

    /// Write `count` zero bytes.
    pub fn write_zeros(&mut self, count: u64) -> Result<(), IoError> {
        const ZEROS: [u8; 512] = [0; 512];
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(ZEROS.len() as u64) as usize;
            self.write_bytes(&ZEROS[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Zero-fill up to `offset`.
    ///
    /// Returns `false` without writing if the sink is already past `offset`.
    pub fn pad_to(&mut self, offset: u64) -> Result<bool, IoError> {
        if self.position > offset {
            return Ok(false);
        }
        self.write_zeros(offset - self.position)?;
        Ok(true)
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), IoError> {
        self.inner
            .flush()
            .map_err(|e| IoError::Write(e.to_string()))
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
