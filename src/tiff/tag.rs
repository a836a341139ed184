//! Tag representations.
//!
//! A parsed directory holds [`DiskTag`]s: the entry header plus the raw
//! value field, resolved against the shared reader on first access. Edited
//! or loaded directories hold [`MemoryTag`]s whose payload is already
//! materialized. [`Tag`] gives both forms one accessor surface.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use crate::error::{IoError, Result, TiffError};
use crate::io::ByteStreamReader;

use super::header::ByteOrder;
use super::ifd::TiffIfd;
use super::tags::{DataType, TagId};
use super::values::Value;

// =============================================================================
// Disk-backed tags
// =============================================================================

/// Where a disk tag's payload lives once its true size is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSource {
    /// Payload stored in the entry's value field
    Inline { bytes: Vec<u8> },
    /// Payload stored elsewhere in the file
    OnDisk { offset: u64, size: u64 },
}

/// Resolution state of a disk tag, as observed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    Unresolved,
    Inline,
    OnDisk,
}

/// A tag read from a directory entry whose payload is fetched lazily.
#[derive(Debug, Clone)]
pub struct DiskTag {
    id: TagId,
    data_type: DataType,
    count: u64,
    /// Count supplied by the tag policy when the entry declares zero
    count_hint: Option<u64>,
    raw: [u8; 8],
    reader: Arc<ByteStreamReader>,
    byte_order: ByteOrder,
    is_bigtiff: bool,
    source: OnceLock<TagSource>,
    value: OnceLock<Value>,
}

impl DiskTag {
    /// Build from a parsed entry. `raw` is the entry's value field: 4 bytes
    /// for classic TIFF, 8 for BigTIFF.
    pub fn new(
        id: TagId,
        data_type: DataType,
        count: u64,
        raw: &[u8],
        reader: Arc<ByteStreamReader>,
        is_bigtiff: bool,
    ) -> Self {
        let mut field = [0u8; 8];
        let n = raw.len().min(8);
        field[..n].copy_from_slice(&raw[..n]);
        let byte_order = reader.byte_order();
        Self {
            id,
            data_type,
            count,
            count_hint: None,
            raw: field,
            reader,
            byte_order,
            is_bigtiff,
            source: OnceLock::new(),
            value: OnceLock::new(),
        }
    }

    /// Supply the count to use when the entry declares zero elements.
    ///
    /// Ignored once the tag has been resolved or if the declared count is
    /// non-zero.
    pub fn set_count_hint(&mut self, count: u64) {
        if self.count == 0 && self.source.get().is_none() {
            self.count_hint = Some(count);
        }
    }

    pub fn id(&self) -> TagId {
        self.id
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Count as declared in the entry.
    pub fn declared_count(&self) -> u64 {
        self.count
    }

    /// Count used for decoding: the declared count, or the policy's hint for
    /// zero-count entries.
    pub fn count(&self) -> u64 {
        match (self.count, self.count_hint) {
            (0, Some(hint)) => hint,
            (count, _) => count,
        }
    }

    /// The raw entry value field.
    pub fn raw(&self) -> &[u8] {
        if self.is_bigtiff {
            &self.raw
        } else {
            &self.raw[..4]
        }
    }

    pub fn state(&self) -> TagState {
        match self.source.get() {
            None => TagState::Unresolved,
            Some(TagSource::Inline { .. }) => TagState::Inline,
            Some(TagSource::OnDisk { .. }) => TagState::OnDisk,
        }
    }

    /// Decide, once, whether the payload is inline or in the file.
    pub fn source(&self) -> &TagSource {
        self.source.get_or_init(|| {
            let size = self.count().saturating_mul(self.data_type.size_in_bytes() as u64);
            if self.data_type.fits_inline(self.count(), self.is_bigtiff) {
                // Reinterpret the entry field with the true type
                TagSource::Inline {
                    bytes: self.raw[..size as usize].to_vec(),
                }
            } else {
                let offset = if self.is_bigtiff {
                    self.byte_order.read_u64(&self.raw)
                } else {
                    self.byte_order.read_u32(&self.raw[..4]) as u64
                };
                TagSource::OnDisk { offset, size }
            }
        })
    }

    /// The decoded value, read from the file on first call.
    pub fn value(&self) -> Result<&Value> {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let count = self.count() as usize;
        let decoded = match self.source() {
            TagSource::Inline { bytes } => {
                Value::decode(self.data_type, count, bytes, self.byte_order)?
            }
            TagSource::OnDisk { offset, size } => {
                check_extent(&self.reader, *offset, *size)?;
                let bytes = self.reader.read_exact(*offset, *size as usize)?;
                Value::decode(self.data_type, count, &bytes, self.byte_order)?
            }
        };

        Ok(self.value.get_or_init(move || decoded))
    }

    /// Offset of the out-of-line payload, if there is one.
    pub fn payload_offset(&self) -> Option<u64> {
        match self.source() {
            TagSource::OnDisk { offset, .. } => Some(*offset),
            TagSource::Inline { .. } => None,
        }
    }
}

// =============================================================================
// In-memory tags
// =============================================================================

/// One slot of a sub-IFD pointer tag.
#[derive(Debug, Clone)]
pub enum IfdRef {
    /// File offset of a directory not parsed yet
    Unresolved(u64),
    /// Parsed or constructed directory
    Resolved(Box<TiffIfd>),
}

impl IfdRef {
    pub fn resolved(&self) -> Option<&TiffIfd> {
        match self {
            IfdRef::Resolved(ifd) => Some(ifd),
            IfdRef::Unresolved(_) => None,
        }
    }

    pub fn resolved_mut(&mut self) -> Option<&mut TiffIfd> {
        match self {
            IfdRef::Resolved(ifd) => Some(ifd),
            IfdRef::Unresolved(_) => None,
        }
    }

    /// Offset in the source file, when known.
    pub fn source_offset(&self) -> Option<u64> {
        match self {
            IfdRef::Unresolved(offset) => Some(*offset),
            IfdRef::Resolved(ifd) => ifd.offset(),
        }
    }
}

/// One strip or tile of image data.
#[derive(Debug, Clone)]
pub enum ChunkRef {
    /// Bytes still in the source file
    File {
        reader: Arc<ByteStreamReader>,
        offset: u64,
        len: u64,
    },
    /// Bytes supplied by the caller
    Memory(Bytes),
}

impl ChunkRef {
    /// Stored (possibly compressed) length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            ChunkRef::File { len, .. } => *len,
            ChunkRef::Memory(bytes) => bytes.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source_offset(&self) -> Option<u64> {
        match self {
            ChunkRef::File { offset, .. } => Some(*offset),
            ChunkRef::Memory(_) => None,
        }
    }

    /// Fetch the stored bytes.
    pub fn read(&self) -> Result<Bytes> {
        match self {
            ChunkRef::File {
                reader,
                offset,
                len,
            } => {
                check_extent(reader, *offset, *len)?;
                Ok(reader.read_exact(*offset, *len as usize)?)
            }
            ChunkRef::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Fail unless `len` bytes at `offset` lie inside the source.
pub(crate) fn check_extent(reader: &ByteStreamReader, offset: u64, len: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= reader.len() => Ok(()),
        _ => Err(IoError::UnexpectedEndOfData {
            offset,
            requested: len,
            available: reader.len().saturating_sub(offset),
        }
        .into()),
    }
}

/// Materialized payload of an in-memory tag.
#[derive(Debug, Clone)]
pub enum Payload {
    Value(Value),
    /// Pointer tag whose targets are directories
    SubIfds {
        data_type: DataType,
        refs: Vec<IfdRef>,
    },
    /// Offsets tag whose targets are strips or tiles
    Chunks(Vec<ChunkRef>),
}

/// A tag whose payload is held in memory.
#[derive(Debug, Clone)]
pub struct MemoryTag {
    id: TagId,
    payload: Payload,
}

impl MemoryTag {
    pub fn new(id: TagId, payload: Payload) -> Self {
        Self { id, payload }
    }

    pub fn from_value(id: TagId, value: Value) -> Self {
        Self::new(id, Payload::Value(value))
    }

    pub fn id(&self) -> TagId {
        self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn data_type(&self) -> DataType {
        match &self.payload {
            Payload::Value(value) => value.data_type(),
            Payload::SubIfds { data_type, .. } => *data_type,
            Payload::Chunks(_) => DataType::Long,
        }
    }

    pub fn count(&self) -> u64 {
        match &self.payload {
            Payload::Value(value) => value.count() as u64,
            Payload::SubIfds { refs, .. } => refs.len() as u64,
            Payload::Chunks(chunks) => chunks.len() as u64,
        }
    }

    /// The payload viewed as a plain value.
    ///
    /// Structural payloads report the offsets they were read from; chunks or
    /// directories built in memory report 0.
    pub fn value(&self) -> Cow<'_, Value> {
        match &self.payload {
            Payload::Value(value) => Cow::Borrowed(value),
            Payload::SubIfds { data_type, refs } => {
                let offsets: Vec<u64> = refs.iter().map(|r| r.source_offset().unwrap_or(0)).collect();
                let value = Value::from_u64s(*data_type, &offsets)
                    .unwrap_or(Value::Long8(offsets));
                Cow::Owned(value)
            }
            Payload::Chunks(chunks) => Cow::Owned(Value::Long8(
                chunks.iter().map(|c| c.source_offset().unwrap_or(0)).collect(),
            )),
        }
    }
}

// =============================================================================
// Tag
// =============================================================================

/// A directory entry in either lifecycle form.
#[derive(Debug, Clone)]
pub enum Tag {
    Disk(DiskTag),
    Memory(MemoryTag),
}

impl Tag {
    pub fn id(&self) -> TagId {
        match self {
            Tag::Disk(tag) => tag.id(),
            Tag::Memory(tag) => tag.id(),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Tag::Disk(tag) => tag.data_type(),
            Tag::Memory(tag) => tag.data_type(),
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Tag::Disk(tag) => tag.count(),
            Tag::Memory(tag) => tag.count(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self, Tag::Memory(_))
    }

    /// The tag's value, resolving a disk tag if needed.
    pub fn value(&self) -> Result<Cow<'_, Value>> {
        match self {
            Tag::Disk(tag) => tag.value().map(Cow::Borrowed),
            Tag::Memory(tag) => Ok(tag.value()),
        }
    }

    fn wrong_type(&self, wanted: &str) -> TiffError {
        TiffError::WrongType {
            tag: self.id(),
            found: format!("{} where {} was expected", self.data_type(), wanted),
        }
    }

    // -------------------------------------------------------------------------
    // Promoting accessors
    // -------------------------------------------------------------------------

    /// Values as u16, promoting BYTE.
    pub fn as_u16s(&self) -> Result<Vec<u16>> {
        let value = self.value()?;
        match value.as_ref() {
            Value::Byte(v) => Ok(v.iter().map(|&x| x as u16).collect()),
            Value::Short(v) => Ok(v.clone()),
            _ => Err(self.wrong_type("BYTE or SHORT")),
        }
    }

    /// Values as u64, promoting any unsigned integer type.
    pub fn as_u64s(&self) -> Result<Vec<u64>> {
        let value = self.value()?;
        match value.as_ref() {
            Value::Byte(_)
            | Value::Short(_)
            | Value::Long(_)
            | Value::Ifd(_)
            | Value::Long8(_)
            | Value::Ifd8(_) => value
                .to_u64s()
                .ok_or_else(|| self.wrong_type("an unsigned integer")),
            _ => Err(self.wrong_type("an unsigned integer")),
        }
    }

    /// The single (first) value as u64.
    pub fn as_u64(&self) -> Result<u64> {
        self.as_u64s()?
            .first()
            .copied()
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: self.id(),
                message: "no elements".to_string(),
            })
    }

    /// Values as f64, for any numeric type.
    pub fn as_f64s(&self) -> Result<Vec<f64>> {
        self.value()?
            .to_f64s()
            .ok_or_else(|| self.wrong_type("a numeric type"))
    }

    /// ASCII value up to the first NUL.
    pub fn as_str(&self) -> Result<String> {
        self.value()?.as_str().ok_or_else(|| self.wrong_type("ASCII"))
    }

    /// Convert to the in-memory form, decoding a disk tag's value.
    pub fn to_memory(&self) -> Result<MemoryTag> {
        match self {
            Tag::Disk(tag) => Ok(MemoryTag::from_value(tag.id(), tag.value()?.clone())),
            Tag::Memory(tag) => Ok(tag.clone()),
        }
    }
}

impl From<MemoryTag> for Tag {
    fn from(tag: MemoryTag) -> Self {
        Tag::Memory(tag)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: Vec<u8>, order: ByteOrder) -> Arc<ByteStreamReader> {
        let mut reader = ByteStreamReader::from_bytes(data);
        reader.set_byte_order(order);
        Arc::new(reader)
    }

    #[test]
    fn test_disk_tag_inline_short() {
        let r = reader(vec![0; 16], ByteOrder::LittleEndian);
        let tag = DiskTag::new(TagId::COMPRESSION, DataType::Short, 1, &[1, 0, 0, 0], r, false);
        assert_eq!(tag.state(), TagState::Unresolved);
        assert_eq!(tag.value().unwrap(), &Value::Short(vec![1]));
        assert_eq!(tag.state(), TagState::Inline);
    }

    #[test]
    fn test_disk_tag_on_disk_resolves_once() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&[0, 10, 0, 20, 0, 30]);
        let r = reader(data, ByteOrder::BigEndian);
        let tag = DiskTag::new(TagId::BITS_PER_SAMPLE, DataType::Short, 3, &[0, 0, 0, 8], r, false);

        assert_eq!(tag.payload_offset(), Some(8));
        assert_eq!(tag.state(), TagState::OnDisk);
        let first = tag.value().unwrap() as *const Value;
        let second = tag.value().unwrap() as *const Value;
        assert_eq!(first, second);
        assert_eq!(tag.value().unwrap(), &Value::Short(vec![10, 20, 30]));
    }

    #[test]
    fn test_disk_tag_bigtiff_inline_threshold() {
        let r = reader(vec![0; 16], ByteOrder::LittleEndian);
        let raw = [1, 0, 0, 0, 2, 0, 0, 0];
        let tag = DiskTag::new(TagId::STRIP_OFFSETS, DataType::Long, 2, &raw, r, true);
        assert_eq!(tag.value().unwrap(), &Value::Long(vec![1, 2]));
        assert_eq!(tag.state(), TagState::Inline);
    }

    #[test]
    fn test_disk_tag_count_hint() {
        let r = reader(vec![0; 16], ByteOrder::LittleEndian);
        let mut tag = DiskTag::new(TagId::BITS_PER_SAMPLE, DataType::Short, 0, &[8, 0, 8, 0], r, false);
        tag.set_count_hint(2);
        assert_eq!(tag.declared_count(), 0);
        assert_eq!(tag.count(), 2);
        assert_eq!(tag.value().unwrap(), &Value::Short(vec![8, 8]));
    }

    #[test]
    fn test_disk_tag_past_end_of_file() {
        let r = reader(vec![0; 16], ByteOrder::LittleEndian);
        let tag = DiskTag::new(TagId::SOFTWARE, DataType::Ascii, 100, &[8, 0, 0, 0], r, false);
        assert!(matches!(
            tag.value(),
            Err(TiffError::Io(IoError::UnexpectedEndOfData { offset: 8, .. }))
        ));
    }

    #[test]
    fn test_promoting_accessors() {
        let shorts = Tag::Memory(MemoryTag::from_value(
            TagId::BITS_PER_SAMPLE,
            Value::Short(vec![1, 2, 3]),
        ));
        assert_eq!(shorts.as_u64s().unwrap(), vec![1u64, 2, 3]);

        let bytes = Tag::Memory(MemoryTag::from_value(TagId::INK_SET, Value::Byte(vec![255])));
        assert_eq!(bytes.as_u64s().unwrap(), vec![255u64]);
        assert_eq!(bytes.as_u16s().unwrap(), vec![255u16]);

        let longs = Tag::Memory(MemoryTag::from_value(TagId::IMAGE_WIDTH, Value::Long(vec![9])));
        assert!(matches!(longs.as_u16s(), Err(TiffError::WrongType { .. })));
        assert_eq!(longs.as_u64().unwrap(), 9);
    }

    #[test]
    fn test_accessor_shape_mismatch() {
        let ascii = Tag::Memory(MemoryTag::from_value(TagId::SOFTWARE, Value::ascii("x")));
        assert!(matches!(ascii.as_u64s(), Err(TiffError::WrongType { .. })));
        assert_eq!(ascii.as_str().unwrap(), "x");

        let signed = Tag::Memory(MemoryTag::from_value(TagId(60000), Value::SShort(vec![1])));
        assert!(signed.as_u64s().is_err());
        assert_eq!(signed.as_f64s().unwrap(), vec![1.0]);
    }

    #[test]
    fn test_chunk_payload_reports_offsets() {
        let r = reader(vec![7; 32], ByteOrder::LittleEndian);
        let tag = MemoryTag::new(
            TagId::STRIP_OFFSETS,
            Payload::Chunks(vec![
                ChunkRef::File {
                    reader: r,
                    offset: 16,
                    len: 4,
                },
                ChunkRef::Memory(Bytes::from_static(&[1, 2])),
            ]),
        );
        assert_eq!(tag.count(), 2);
        assert_eq!(tag.value().as_ref(), &Value::Long8(vec![16, 0]));
        if let Payload::Chunks(chunks) = tag.payload() {
            assert_eq!(chunks[0].read().unwrap().as_ref(), &[7, 7, 7, 7]);
            assert_eq!(chunks[1].len(), 2);
        }
    }
}
