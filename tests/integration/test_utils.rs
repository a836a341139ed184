//! Test utilities for integration tests.
//!
//! Files are assembled byte by byte so that the parser is checked against an
//! encoder it does not share code with.

use tiff_ifd::{open_tiff, ByteOrder, ByteStreamReader, TiffDocument, TiffIfd};

// Field type codes
pub const BYTE: u16 = 1;
pub const ASCII: u16 = 2;
pub const SHORT: u16 = 3;
pub const LONG: u16 = 4;
pub const RATIONAL: u16 = 5;
pub const DOUBLE: u16 = 12;
pub const LONG8: u16 = 16;

// =============================================================================
// Encoding helpers
// =============================================================================

pub fn enc_u16(order: ByteOrder, value: u16) -> Vec<u8> {
    match order {
        ByteOrder::LittleEndian => value.to_le_bytes().to_vec(),
        ByteOrder::BigEndian => value.to_be_bytes().to_vec(),
    }
}

pub fn enc_u32(order: ByteOrder, value: u32) -> Vec<u8> {
    match order {
        ByteOrder::LittleEndian => value.to_le_bytes().to_vec(),
        ByteOrder::BigEndian => value.to_be_bytes().to_vec(),
    }
}

pub fn enc_u64(order: ByteOrder, value: u64) -> Vec<u8> {
    match order {
        ByteOrder::LittleEndian => value.to_le_bytes().to_vec(),
        ByteOrder::BigEndian => value.to_be_bytes().to_vec(),
    }
}

// =============================================================================
// TIFF File Builder
// =============================================================================

/// Builder for single-directory test files.
///
/// Layout: header, directory, strips, then out-of-line payloads in tag
/// order.
pub struct TiffBuilder {
    byte_order: ByteOrder,
    is_bigtiff: bool,
    entries: Vec<RawEntry>,
    strips: Vec<Vec<u8>>,
}

struct RawEntry {
    tag: u16,
    field_type: u16,
    count: u64,
    payload: Vec<u8>,
}

impl TiffBuilder {
    pub fn new(byte_order: ByteOrder, is_bigtiff: bool) -> Self {
        Self {
            byte_order,
            is_bigtiff,
            entries: Vec::new(),
            strips: Vec::new(),
        }
    }

    /// Add an entry with an already encoded payload.
    pub fn raw(mut self, tag: u16, field_type: u16, count: u64, payload: Vec<u8>) -> Self {
        self.entries.push(RawEntry {
            tag,
            field_type,
            count,
            payload,
        });
        self
    }

    pub fn short(self, tag: u16, values: &[u16]) -> Self {
        let order = self.byte_order;
        let payload = values.iter().flat_map(|&v| enc_u16(order, v)).collect();
        self.raw(tag, SHORT, values.len() as u64, payload)
    }

    pub fn long(self, tag: u16, values: &[u32]) -> Self {
        let order = self.byte_order;
        let payload = values.iter().flat_map(|&v| enc_u32(order, v)).collect();
        self.raw(tag, LONG, values.len() as u64, payload)
    }

    pub fn ascii(self, tag: u16, text: &str) -> Self {
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        let count = payload.len() as u64;
        self.raw(tag, ASCII, count, payload)
    }

    pub fn rational(self, tag: u16, numerator: u32, denominator: u32) -> Self {
        let order = self.byte_order;
        let mut payload = enc_u32(order, numerator);
        payload.extend(enc_u32(order, denominator));
        self.raw(tag, RATIONAL, 1, payload)
    }

    /// Add strips with LONG StripOffsets and StripByteCounts.
    pub fn strips(mut self, strips: Vec<Vec<u8>>) -> Self {
        self.strips = strips;
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let order = self.byte_order;
        let big = self.is_bigtiff;
        let entry_size = if big { 20 } else { 12 };
        let field_size = if big { 8 } else { 4 };
        let header_size: u64 = if big { 16 } else { 8 };

        let strip_entries = if self.strips.is_empty() { 0 } else { 2 };
        let entry_count = self.entries.len() + strip_entries;
        let ifd_size = if big {
            8 + entry_count * entry_size + 8
        } else {
            2 + entry_count * entry_size + 4
        };
        let mut pos = header_size + ifd_size as u64;

        // Strips go right after the directory
        let mut strip_data = Vec::new();
        if !self.strips.is_empty() {
            let mut offsets = Vec::new();
            let mut counts = Vec::new();
            for strip in &self.strips {
                offsets.push(pos as u32);
                counts.push(strip.len() as u32);
                pos += strip.len() as u64;
                strip_data.extend_from_slice(strip);
            }
            let strips = std::mem::take(&mut self.strips);
            self = self.long(273, &offsets).long(279, &counts);
            self.strips = strips;
        }
        self.entries.sort_by_key(|e| e.tag);

        // Header
        let mut data = match order {
            ByteOrder::LittleEndian => b"II".to_vec(),
            ByteOrder::BigEndian => b"MM".to_vec(),
        };
        if big {
            data.extend(enc_u16(order, 43));
            data.extend(enc_u16(order, 8));
            data.extend(enc_u16(order, 0));
            data.extend(enc_u64(order, header_size));
        } else {
            data.extend(enc_u16(order, 42));
            data.extend(enc_u32(order, header_size as u32));
        }

        // Directory
        let mut tail = Vec::new();
        if big {
            data.extend(enc_u64(order, entry_count as u64));
        } else {
            data.extend(enc_u16(order, entry_count as u16));
        }
        for entry in &self.entries {
            data.extend(enc_u16(order, entry.tag));
            data.extend(enc_u16(order, entry.field_type));
            if big {
                data.extend(enc_u64(order, entry.count));
            } else {
                data.extend(enc_u32(order, entry.count as u32));
            }
            if entry.payload.len() <= field_size {
                let mut field = entry.payload.clone();
                field.resize(field_size, 0);
                data.extend(field);
            } else {
                let at = pos + tail.len() as u64;
                if big {
                    data.extend(enc_u64(order, at));
                } else {
                    data.extend(enc_u32(order, at as u32));
                }
                tail.extend_from_slice(&entry.payload);
            }
        }
        if big {
            data.extend(enc_u64(order, 0));
        } else {
            data.extend(enc_u32(order, 0));
        }

        data.extend(strip_data);
        data.extend(tail);
        data
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Classic 2x2 8-bit grayscale image in one uncompressed strip.
pub fn gray_2x2(order: ByteOrder, is_bigtiff: bool) -> Vec<u8> {
    TiffBuilder::new(order, is_bigtiff)
        .short(256, &[2])
        .short(257, &[2])
        .short(258, &[8])
        .short(259, &[1])
        .short(262, &[1])
        .short(277, &[1])
        .long(278, &[2])
        .strips(vec![vec![10, 20, 30, 40]])
        .build()
}

/// Uncompressed 16-bit grayscale image, `rows_per_strip` rows per strip.
pub fn gray16(order: ByteOrder, width: u16, height: u16, rows_per_strip: u16) -> Vec<u8> {
    let row_bytes = width as usize * 2;
    let strips = (0..height)
        .step_by(rows_per_strip as usize)
        .map(|row| {
            let rows = rows_per_strip.min(height - row) as usize;
            (0..rows * row_bytes).map(|i| (row as usize * row_bytes + i) as u8).collect()
        })
        .collect();

    TiffBuilder::new(order, false)
        .short(256, &[width])
        .short(257, &[height])
        .short(258, &[16])
        .short(259, &[1])
        .short(262, &[1])
        .short(278, &[rows_per_strip])
        .strips(strips)
        .build()
}

pub fn open(data: Vec<u8>) -> TiffDocument {
    open_tiff(ByteStreamReader::from_bytes(data)).expect("valid TIFF")
}

pub fn first_ifd(data: Vec<u8>) -> TiffIfd {
    open(data).first_ifd().expect("valid first IFD")
}

/// Strip bytes of a saved file, read straight from the output.
pub fn strip_bytes(file: &[u8], ifd: &TiffIfd) -> Vec<Vec<u8>> {
    let offsets = ifd.get_u64s(tiff_ifd::TagId::STRIP_OFFSETS).unwrap();
    let counts = ifd.get_u64s(tiff_ifd::TagId::STRIP_BYTE_COUNTS).unwrap();
    offsets
        .iter()
        .zip(&counts)
        .map(|(&o, &c)| file[o as usize..(o + c) as usize].to_vec())
        .collect()
}
