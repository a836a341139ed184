//! Strip and tile layout planning.
//!
//! Before a directory is written, the planner decides where every strip or
//! tile goes and how the offsets and byte-count arrays are typed and placed.
//! The resulting [`StripPlan`] is a plain value: the emit step walks it in
//! the same order and must land every chunk exactly at its planned offset.
//!
//! Layout of one directory's image data, starting at the planned offset:
//!
//! ```text
//! [pad] chunk 0 [pad] chunk 1 ... [pad] counts array [pad] offsets array
//! ```
//!
//! Every chunk starts on an even offset. Arrays that fit in the entry's
//! value field are stored inline and take no space here.

use tracing::debug;

use crate::error::{Result, TiffError};

use super::header::ByteOrder;
use super::ifd::{ImageParams, TiffIfd};
use super::meta::{policy_for, TagRole};
use super::tag::ChunkRef;
use super::tags::{Compression, DataType, TagId};
use super::values::Value;

/// Size bottom strips or tiles of planar data as full chunks when they are
/// decompressed for byte swapping.
///
/// Padding writes a few unused rows per plane but keeps every chunk of a
/// plane the same size, so the writer never needs exact bottom-edge sizes.
pub const PAD_BOTTOM_TILES: bool = true;

/// Largest offset or byte count a classic file stores in a LONG array.
///
/// Offsets are kept within the signed 32-bit range that many readers use.
pub const CLASSIC_LONG_LIMIT: u64 = i32::MAX as u64;

// =============================================================================
// Plan types
// =============================================================================

/// Where an offsets or byte-counts array is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayPlacement {
    /// In the directory entry's value field
    Inline,
    /// At a file offset after the chunk data
    At(u64),
}

/// Decompressed geometry of one chunk on the byte-swap path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkShape {
    /// Samples in one row of the chunk
    pub samples_per_row: u64,
    pub rows: u64,
    pub bits: u16,
    /// Planned uncompressed length in bytes
    pub len: u64,
}

/// Decompress-and-swap instructions for a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapPlan {
    /// Compression of the stored chunks
    pub compression: u16,
    pub shapes: Vec<ChunkShape>,
    /// Entries rewritten because the data is stored uncompressed
    pub overrides: Vec<(TagId, Value)>,
}

/// Planned placement of one directory's strips or tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct StripPlan {
    pub offsets_tag: TagId,
    pub counts_tag: TagId,
    /// Offset where planning began
    pub start: u64,
    /// Bytes written for each chunk
    pub sizes: Vec<u64>,
    /// Planned offset of each chunk
    pub offsets: Vec<u64>,
    pub max_size: u64,
    pub last_offset: u64,
    /// End of the last chunk
    pub data_end: u64,
    /// Bytes from `start` to the end of the arrays, alignment included
    pub total_size: u64,
    pub count_type: DataType,
    pub offset_type: DataType,
    pub counts_at: ArrayPlacement,
    pub offsets_at: ArrayPlacement,
    pub swap: Option<SwapPlan>,
}

impl StripPlan {
    /// First offset after everything this plan places.
    pub fn end(&self) -> u64 {
        self.start + self.total_size
    }

    /// Alignment bytes inserted before chunks.
    pub fn padding(&self) -> u64 {
        self.data_end - self.start - self.sizes.iter().sum::<u64>()
    }

    /// The byte-counts array in its chosen type.
    pub fn counts_value(&self) -> Result<Value> {
        Value::from_u64s(self.count_type, &self.sizes).ok_or_else(|| {
            TiffError::LayoutMismatch(format!("byte counts do not fit {}", self.count_type))
        })
    }

    /// The offsets array in its chosen type.
    pub fn offsets_value(&self) -> Result<Value> {
        Value::from_u64s(self.offset_type, &self.offsets).ok_or_else(|| {
            TiffError::LayoutMismatch(format!("offsets do not fit {}", self.offset_type))
        })
    }

    /// Entries to rewrite, if the data is being re-encoded.
    pub fn overrides(&self) -> &[(TagId, Value)] {
        self.swap.as_ref().map_or(&[], |s| s.overrides.as_slice())
    }
}

// =============================================================================
// Planning
// =============================================================================

fn checked_mul(a: u64, b: u64, what: &str) -> Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| TiffError::UnsupportedSize(format!("{what} overflows 64 bits")))
}

fn checked_add(a: u64, b: u64, what: &str) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| TiffError::UnsupportedSize(format!("{what} overflows 64 bits")))
}

/// Smallest array type whose range covers `max`.
///
/// # Errors
/// `UnsupportedSize` if LONG8 is needed and the output is not BigTIFF.
pub fn determine_array_size(max: u64, is_bigtiff: bool) -> Result<DataType> {
    if max <= DataType::Short.max_representable() {
        Ok(DataType::Short)
    } else if max <= CLASSIC_LONG_LIMIT {
        Ok(DataType::Long)
    } else if is_bigtiff {
        Ok(DataType::Long8)
    } else {
        Err(TiffError::UnsupportedSize(format!(
            "value {max} needs LONG8, which requires BigTIFF"
        )))
    }
}

/// Whether chunks must be decompressed and byte swapped to change byte
/// order.
///
/// Swapping is needed when the byte order changes, some sample is wider than
/// 8 bits, and the data is not JPEG-family compressed.
///
/// # Errors
/// `Unimplemented` for chroma-subsampled YCbCr data that would need swapping.
pub fn requires_swap(params: &ImageParams, source: ByteOrder, target: ByteOrder) -> Result<bool> {
    if source == target || params.bits_per_sample.iter().all(|&b| b <= 8) {
        return Ok(false);
    }
    if Compression::from_u16(params.compression).is_some_and(Compression::is_jpeg_family) {
        return Ok(false);
    }
    if params.is_subsampled_ycbcr() {
        return Err(TiffError::Unimplemented(
            "byte swapping subsampled YCbCr data".to_string(),
        ));
    }
    Ok(true)
}

/// Decompressed shape of every chunk, in storage order.
///
/// # Errors
/// - `NonUniformSampleDepths` for chunky data with mixed bit depths
/// - `UnsupportedSize` if a chunk's size overflows 64 bits
pub fn swap_shapes(params: &ImageParams) -> Result<Vec<ChunkShape>> {
    let chunk_width = params.chunk_width();
    let chunk_height = params.chunk_height();
    let across = params.chunks_across();
    let down = params.chunks_down();
    let bottom_rows = params
        .height
        .saturating_sub(down.saturating_sub(1).saturating_mul(chunk_height));
    let bits = &params.bits_per_sample;

    let mut shapes = Vec::new();
    if params.is_planar() {
        for &plane_bits in bits.iter().take(params.samples_per_pixel as usize) {
            let row_bytes = checked_mul(plane_bits as u64, chunk_width, "row size")?.div_ceil(8);
            // Bottom chunks never hold more than `chunk_height` rows
            checked_mul(row_bytes, chunk_height, "chunk size")?;
            for row in 0..down {
                let rows = if row + 1 == down && !PAD_BOTTOM_TILES {
                    bottom_rows
                } else {
                    chunk_height
                };
                for _ in 0..across {
                    shapes.push(ChunkShape {
                        samples_per_row: chunk_width,
                        rows,
                        bits: plane_bits,
                        len: row_bytes * rows,
                    });
                }
            }
        }
    } else {
        let first = bits.first().copied().unwrap_or(1);
        if bits.iter().any(|&b| b != first) {
            return Err(TiffError::NonUniformSampleDepths(bits.clone()));
        }
        let row_bytes =
            checked_mul(params.bits_per_pixel(), chunk_width, "row size")?.div_ceil(8);
        let samples_per_row =
            checked_mul(chunk_width, params.samples_per_pixel as u64, "row size")?;
        checked_mul(row_bytes, chunk_height, "chunk size")?;
        for row in 0..down {
            let rows = if row + 1 == down {
                bottom_rows
            } else {
                chunk_height
            };
            for _ in 0..across {
                shapes.push(ChunkShape {
                    samples_per_row,
                    rows,
                    bits: first,
                    len: row_bytes * rows,
                });
            }
        }
    }
    Ok(shapes)
}

/// Plan chunks of the given stored lengths starting at `start`.
///
/// With `swap`, chunk sizes come from the image geometry instead of
/// `chunk_lens`, and the number of chunks must match it.
pub fn plan_chunks(
    params: &ImageParams,
    offsets_tag: TagId,
    chunk_lens: &[u64],
    swap: bool,
    start: u64,
    is_bigtiff: bool,
) -> Result<StripPlan> {
    let TagRole::ChunkOffsets { counts: counts_tag, .. } = policy_for(offsets_tag).role() else {
        return Err(TiffError::InvalidTagValue {
            tag: offsets_tag,
            message: "not a strip or tile offsets tag".to_string(),
        });
    };

    let (sizes, swap) = if swap {
        let expected = params.chunks_per_plane().saturating_mul(params.planes());
        if expected != chunk_lens.len() as u64 {
            return Err(TiffError::InvalidTagValue {
                tag: offsets_tag,
                message: format!(
                    "image geometry implies {expected} chunks, found {}",
                    chunk_lens.len()
                ),
            });
        }
        let shapes = swap_shapes(params)?;

        let mut overrides = Vec::new();
        if params.compression != Compression::None as u16 {
            overrides.push((TagId::COMPRESSION, Value::Short(vec![1])));
            if params.predictor != 1 {
                overrides.push((TagId::PREDICTOR, Value::Short(vec![1])));
            }
        }
        let sizes = shapes.iter().map(|s| s.len).collect();
        let swap = SwapPlan {
            compression: params.compression,
            shapes,
            overrides,
        };
        (sizes, Some(swap))
    } else {
        (chunk_lens.to_vec(), None)
    };

    let mut pos = start;
    let mut offsets = Vec::with_capacity(sizes.len());
    for &size in &sizes {
        pos = checked_add(pos, pos & 1, "chunk offset")?;
        offsets.push(pos);
        pos = checked_add(pos, size, "chunk offset")?;
    }
    let data_end = pos;

    let max_size = sizes.iter().copied().max().unwrap_or(0);
    let last_offset = offsets.last().copied().unwrap_or(start);
    let count_type = determine_array_size(max_size, is_bigtiff)?;
    let offset_type = determine_array_size(last_offset, is_bigtiff)?;

    let threshold = DataType::inline_threshold(is_bigtiff);
    let n = sizes.len() as u64;
    let mut place = |data_type: DataType| -> Result<ArrayPlacement> {
        let len = checked_mul(n, data_type.size_in_bytes() as u64, "array size")?;
        if len <= threshold {
            return Ok(ArrayPlacement::Inline);
        }
        let at = checked_add(pos, pos & 1, "array offset")?;
        pos = checked_add(at, len, "array offset")?;
        Ok(ArrayPlacement::At(at))
    };
    let counts_at = place(count_type)?;
    let offsets_at = place(offset_type)?;

    Ok(StripPlan {
        offsets_tag,
        counts_tag,
        start,
        sizes,
        offsets,
        max_size,
        last_offset,
        data_end,
        total_size: pos - start,
        count_type,
        offset_type,
        counts_at,
        offsets_at,
        swap,
    })
}

/// Plan the image data of `ifd`, which must be loaded into memory.
///
/// Returns `None` for directories without strips or tiles.
pub fn plan(
    ifd: &TiffIfd,
    start: u64,
    target_order: ByteOrder,
    is_bigtiff: bool,
) -> Result<Option<StripPlan>> {
    let Some((offsets_tag, chunks)) = ifd.chunks()? else {
        return Ok(None);
    };

    let params = ifd.image_params()?;
    let swap = requires_swap(&params, ifd.byte_order(), target_order)?;
    if swap {
        // Geometry drives the sizes, so it must be present
        ifd.get_required(TagId::IMAGE_WIDTH)?;
        ifd.get_required(TagId::IMAGE_LENGTH)?;
    }

    let lens: Vec<u64> = chunks.iter().map(ChunkRef::len).collect();
    let plan = plan_chunks(&params, offsets_tag, &lens, swap, start, is_bigtiff)?;

    debug!(
        tag = %offsets_tag,
        chunks = plan.sizes.len(),
        swap,
        start,
        total = plan.total_size,
        counts = %plan.count_type,
        offsets = %plan.offset_type,
        "Planned image data layout"
    );
    Ok(Some(plan))
}

// =============================================================================
// Tests
// =============================================================================
