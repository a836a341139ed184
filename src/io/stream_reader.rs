use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;

use crate::error::IoError;
use crate::tiff::ByteOrder;

/// Any seekable byte source the reader can wrap.
pub trait ByteSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ByteSource for T {}

/// Random-access reader over a shared byte source.
///
/// Every disk-backed tag of a document holds an `Arc` to the same reader, so
/// each seek+read pair runs inside one critical section. Reads from different
/// call sites never interleave.
pub struct ByteStreamReader {
    inner: Mutex<Box<dyn ByteSource>>,
    len: u64,
    byte_order: ByteOrder,
    identifier: String,
}

impl ByteStreamReader {
    /// Wrap a seekable source.
    ///
    /// The source length is measured once by seeking to the end.
    pub fn new<S: ByteSource + 'static>(
        mut source: S,
        identifier: impl Into<String>,
    ) -> Result<Self, IoError> {
        let len = source.seek(SeekFrom::End(0))?;
        Ok(Self {
            inner: Mutex::new(Box::new(source)),
            len,
            byte_order: ByteOrder::LittleEndian,
            identifier: identifier.into(),
        })
    }

    /// Wrap an in-memory buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let len = data.len() as u64;
        Self {
            inner: Mutex::new(Box::new(Cursor::new(data))),
            len,
            byte_order: ByteOrder::LittleEndian,
            identifier: "memory".to_string(),
        }
    }

    /// Open a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::new(file, path.display().to_string())
    }

    /// Set the byte order used by the integer accessors.
    ///
    /// Called once the header has been parsed, before the reader is shared.
    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    /// Byte order used by the integer accessors.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Total size of the source in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Identifier for logging.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Read up to `buf.len()` bytes at `pos`, returning how many were read.
    ///
    /// Stops early only when the source is exhausted.
    pub fn read(&self, pos: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        let mut source = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        source.seek(SeekFrom::Start(pos))?;

        let mut filled = 0;
        while filled < buf.len() {
            match source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Read exactly `len` bytes starting at `pos`.
    pub fn read_exact(&self, pos: u64, len: usize) -> Result<Bytes, IoError> {
        let mut buf = vec![0u8; len];
        self.read_exact_into(pos, &mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Fill `buf` completely from `pos`.
    pub fn read_exact_into(&self, pos: u64, buf: &mut [u8]) -> Result<(), IoError> {
        let n = self.read(pos, buf)?;
        if n < buf.len() {
            return Err(IoError::UnexpectedEndOfData {
                offset: pos,
                requested: buf.len() as u64,
                available: n as u64,
            });
        }
        Ok(())
    }

    /// Read a u16 at `pos` in the reader's byte order.
    pub fn read_u16(&self, pos: u64) -> Result<u16, IoError> {
        let mut scratch = [0u8; 2];
        self.read_exact_into(pos, &mut scratch)?;
        Ok(self.byte_order.read_u16(&scratch))
    }

    /// Read a u32 at `pos` in the reader's byte order.
    pub fn read_u32(&self, pos: u64) -> Result<u32, IoError> {
        let mut scratch = [0u8; 4];
        self.read_exact_into(pos, &mut scratch)?;
        Ok(self.byte_order.read_u32(&scratch))
    }

    /// Read a u64 at `pos` in the reader's byte order.
    pub fn read_u64(&self, pos: u64) -> Result<u64, IoError> {
        let mut scratch = [0u8; 8];
        self.read_exact_into(pos, &mut scratch)?;
        Ok(self.byte_order.read_u64(&scratch))
    }
}

impl fmt::Debug for ByteStreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStreamReader")
            .field("identifier", &self.identifier)
            .field("len", &self.len)
            .field("byte_order", &self.byte_order)
            .finish()
    }
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// TIFF files can be either little-endian or big-endian, determined by the
// magic bytes at the start of the file.

/// Read a little-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Read a big-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Read a little-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a big-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a little-endian u64 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Read a big-endian u64 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    u64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}
