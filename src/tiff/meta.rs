//! Per-tag policies.
//!
//! Every [`TagId`] maps to exactly one [`MetaTag`]: the data types the tag
//! may be written as, how many elements it carries, what value it takes when
//! absent, and what structural role it plays when a directory is saved.
//! Tags without a dedicated policy share [`GENERIC`], which accepts anything.
//!
//! Policies are immutable statics, so the registry is safe to share between
//! threads and saves.

use crate::error::{Result, TiffError};

use super::ifd::{IfdKind, ImageParams};
use super::tags::{DataType, TagId};
use super::values::Value;

// =============================================================================
// Policy building blocks
// =============================================================================

/// How many elements a tag carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountRule {
    /// Variable length
    Any,
    Exactly(u64),
    /// One element per sample
    SamplesPerPixel,
    /// 3 × 2^BitsPerSample
    ColorMap,
    /// 1 or 3 curves of 2^BitsPerSample entries
    TransferFunction,
    /// One element per strip or tile
    Chunks,
}

/// Value synthesized when a tag is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRule {
    None,
    Short(u16),
    Long(u32),
    /// `[n; SamplesPerPixel]`
    PerSample(u16),
    /// `[2^bps - 1; SamplesPerPixel]`
    MaxSampleValue,
    /// ITU-R BT.601 luma coefficients
    YCbCrCoefficients,
    YCbCrSubSampling,
    ReferenceBlackWhite,
}

/// What a tag's value means to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRole {
    Plain,
    /// Pointer(s) to child directories of the given kind
    SubIfd(IfdKind),
    /// Offsets of strip or tile data; `counts` names the sibling tag
    ChunkOffsets { counts: TagId, tiled: bool },
    /// Byte counts written from the sibling offsets tag's layout plan
    ChunkByteCounts { offsets: TagId },
    /// Describes space in the source file only; never written
    SourceOnly,
}

/// Policy for one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaTag {
    accepted: &'static [DataType],
    count: CountRule,
    default: DefaultRule,
    role: TagRole,
}

impl MetaTag {
    const fn new(accepted: &'static [DataType], count: CountRule) -> Self {
        Self {
            accepted,
            count,
            default: DefaultRule::None,
            role: TagRole::Plain,
        }
    }

    const fn with_default(self, default: DefaultRule) -> Self {
        Self { default, ..self }
    }

    const fn with_role(self, role: TagRole) -> Self {
        Self { role, ..self }
    }

    /// Accepted data types in preference order. Empty means any type.
    pub fn accepted_types(&self) -> &'static [DataType] {
        self.accepted
    }

    pub fn count_rule(&self) -> CountRule {
        self.count
    }

    pub fn role(&self) -> TagRole {
        self.role
    }

    pub fn accepts(&self, data_type: DataType) -> bool {
        self.accepted.is_empty() || self.accepted.contains(&data_type)
    }

    /// Whether the tag's stored value is written as-is.
    ///
    /// Byte-count tags are written from the layout plan of their offsets
    /// sibling; source-only tags are dropped.
    pub fn should_write(&self) -> bool {
        !matches!(
            self.role,
            TagRole::ChunkByteCounts { .. } | TagRole::SourceOnly
        )
    }

    /// The tag whose write step emits this one, if any.
    pub fn replaced_by(&self) -> Option<TagId> {
        match self.role {
            TagRole::ChunkByteCounts { offsets } => Some(offsets),
            _ => None,
        }
    }

    /// Whether the value points at auxiliary data that must be resolved
    /// separately (child directories, strip or tile data).
    pub fn is_offset_data(&self) -> bool {
        matches!(
            self.role,
            TagRole::SubIfd(_) | TagRole::ChunkOffsets { .. }
        )
    }

    /// Element count implied by the image parameters, if fixed.
    pub fn fixed_count(&self, params: &ImageParams) -> Option<u64> {
        let bps = params.bits_per_sample.first().copied().unwrap_or(1) as u32;
        match self.count {
            CountRule::Any => None,
            CountRule::Exactly(n) => Some(n),
            CountRule::SamplesPerPixel => Some(params.samples_per_pixel as u64),
            CountRule::ColorMap => 1u64.checked_shl(bps).and_then(|n| n.checked_mul(3)),
            CountRule::TransferFunction => {
                let curves = if params.samples_per_pixel >= 3 { 3 } else { 1 };
                1u64.checked_shl(bps).and_then(|n| n.checked_mul(curves))
            }
            CountRule::Chunks => params.chunk_count(),
        }
    }

    /// Value to use when the tag is absent.
    pub fn default_value(&self, params: &ImageParams) -> Option<Value> {
        let spp = params.samples_per_pixel.max(1) as usize;
        let bps = params.bits_per_sample.first().copied().unwrap_or(1) as u32;
        let max_sample = 1u64.checked_shl(bps).map_or(u64::MAX, |v| v - 1);

        match self.default {
            DefaultRule::None => None,
            DefaultRule::Short(v) => Some(Value::Short(vec![v])),
            DefaultRule::Long(v) => Some(Value::Long(vec![v])),
            DefaultRule::PerSample(v) => Some(Value::Short(vec![v; spp])),
            DefaultRule::MaxSampleValue => {
                let max = params
                    .bits_per_sample
                    .iter()
                    .map(|&b| {
                        1u32.checked_shl(b as u32)
                            .map_or(u16::MAX, |v| (v - 1).min(u16::MAX as u32) as u16)
                    })
                    .chain(std::iter::repeat(max_sample.min(u16::MAX as u64) as u16))
                    .take(spp)
                    .collect();
                Some(Value::Short(max))
            }
            DefaultRule::YCbCrCoefficients => {
                Some(Value::Rational(vec![(299, 1000), (587, 1000), (114, 1000)]))
            }
            DefaultRule::YCbCrSubSampling => Some(Value::Short(vec![2, 2])),
            DefaultRule::ReferenceBlackWhite => {
                let m = max_sample.min(u32::MAX as u64) as u32;
                let h = 1u32.checked_shl(bps.saturating_sub(1)).unwrap_or(0);
                let pairs = if params.photometric == Some(6) {
                    vec![(0, 1), (m, 1), (h, 1), (m, 1), (h, 1), (m, 1)]
                } else {
                    vec![(0, 1), (m, 1), (0, 1), (m, 1), (0, 1), (m, 1)]
                };
                Some(Value::Rational(pairs))
            }
        }
    }

    /// Re-express `value` as an accepted type, keeping its own type when
    /// accepted. Falls back to the first accepted type that can represent
    /// every element.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        if self.accepts(value.data_type()) {
            return Some(value.clone());
        }
        self.accepted.iter().find_map(|&t| value.convert_to(t))
    }

    /// Choose the on-disk type for `value` in the target flavor.
    ///
    /// Keeps the value's own type when it is accepted and legal for the
    /// output, otherwise takes the first accepted type (escalating) that
    /// represents every element. Classic output never uses 64-bit types.
    ///
    /// # Errors
    /// - `UnsupportedSize` if no accepted integer type is wide enough
    /// - `WrongType` if the value cannot be expressed in any accepted type
    pub fn select_type(&self, id: TagId, value: &Value, is_bigtiff: bool) -> Result<Value> {
        let legal = |t: DataType| is_bigtiff || !t.is_bigtiff_only();
        let current = value.data_type();

        if self.accepts(current) && legal(current) {
            return Ok(value.clone());
        }

        let candidates: Vec<DataType> = if self.accepted.is_empty() {
            // Generic tags narrow their 64-bit types for classic output
            match current {
                DataType::Long8 => vec![DataType::Long],
                DataType::Ifd8 => vec![DataType::Ifd],
                DataType::SLong8 => vec![DataType::SLong],
                _ => Vec::new(),
            }
        } else {
            self.accepted.iter().copied().filter(|&t| legal(t)).collect()
        };

        if let Some(converted) = candidates.iter().find_map(|&t| value.convert_to(t)) {
            return Ok(converted);
        }

        if current.is_integer() && candidates.iter().all(|t| t.is_integer()) {
            Err(TiffError::UnsupportedSize(format!(
                "{id} values do not fit any accepted type{}",
                if is_bigtiff { "" } else { " without BigTIFF" }
            )))
        } else {
            Err(TiffError::WrongType {
                tag: id,
                found: current.to_string(),
            })
        }
    }

    /// Bytes the payload occupies outside the directory when its out-of-line
    /// storage begins at `running_offset`, including the alignment byte.
    pub fn estimate_size(&self, payload_len: u64, running_offset: u64, is_bigtiff: bool) -> u64 {
        if payload_len <= DataType::inline_threshold(is_bigtiff) {
            0
        } else {
            payload_len + (running_offset & 1)
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

const SHORT: &[DataType] = &[DataType::Short];
const LONG: &[DataType] = &[DataType::Long];
const SHORT_LONG: &[DataType] = &[DataType::Short, DataType::Long];
const OFFSET_ARRAY: &[DataType] = &[DataType::Short, DataType::Long, DataType::Long8];
const FREE_ARRAY: &[DataType] = &[DataType::Long, DataType::Long8];
const IFD_POINTER: &[DataType] = &[DataType::Long, DataType::Ifd, DataType::Long8, DataType::Ifd8];
const RATIONAL: &[DataType] = &[DataType::Rational];
const ASCII: &[DataType] = &[DataType::Ascii];
const UNDEFINED: &[DataType] = &[DataType::Undefined];
const BYTES: &[DataType] = &[DataType::Byte, DataType::Undefined];

/// Policy for tags without a dedicated entry.
pub static GENERIC: MetaTag = MetaTag::new(&[], CountRule::Any);

static SCALAR_SHORT: MetaTag = MetaTag::new(SHORT, CountRule::Exactly(1));
static SCALAR_SHORT_LONG: MetaTag = MetaTag::new(SHORT_LONG, CountRule::Exactly(1));
static SCALAR_RATIONAL: MetaTag = MetaTag::new(RATIONAL, CountRule::Exactly(1));
static TEXT: MetaTag = MetaTag::new(ASCII, CountRule::Any);
static SHORT_PAIR: MetaTag = MetaTag::new(SHORT, CountRule::Exactly(2));
static SHORT_LIST: MetaTag = MetaTag::new(SHORT, CountRule::Any);
static BLOB: MetaTag = MetaTag::new(UNDEFINED, CountRule::Any);

static NEW_SUBFILE_TYPE: MetaTag =
    MetaTag::new(LONG, CountRule::Exactly(1)).with_default(DefaultRule::Long(0));
static BITS_PER_SAMPLE: MetaTag =
    MetaTag::new(SHORT, CountRule::SamplesPerPixel).with_default(DefaultRule::PerSample(1));
static SHORT_ONE: MetaTag =
    MetaTag::new(SHORT, CountRule::Exactly(1)).with_default(DefaultRule::Short(1));
static ROWS_PER_STRIP: MetaTag =
    MetaTag::new(SHORT_LONG, CountRule::Exactly(1)).with_default(DefaultRule::Long(u32::MAX));
static MIN_SAMPLE_VALUE: MetaTag =
    MetaTag::new(SHORT, CountRule::SamplesPerPixel).with_default(DefaultRule::PerSample(0));
static MAX_SAMPLE_VALUE: MetaTag =
    MetaTag::new(SHORT, CountRule::SamplesPerPixel).with_default(DefaultRule::MaxSampleValue);
static SAMPLE_FORMAT: MetaTag =
    MetaTag::new(SHORT, CountRule::SamplesPerPixel).with_default(DefaultRule::PerSample(1));
static SHORT_TWO: MetaTag =
    MetaTag::new(SHORT, CountRule::Exactly(1)).with_default(DefaultRule::Short(2));
static LONG_ZERO: MetaTag =
    MetaTag::new(LONG, CountRule::Exactly(1)).with_default(DefaultRule::Long(0));
static DATE_TIME: MetaTag = MetaTag::new(ASCII, CountRule::Exactly(20));
static TRANSFER_FUNCTION: MetaTag = MetaTag::new(SHORT, CountRule::TransferFunction);
static WHITE_POINT: MetaTag = MetaTag::new(RATIONAL, CountRule::Exactly(2));
static PRIMARY_CHROMATICITIES: MetaTag = MetaTag::new(RATIONAL, CountRule::Exactly(6));
static COLOR_MAP: MetaTag = MetaTag::new(SHORT, CountRule::ColorMap);
static DOT_RANGE: MetaTag = MetaTag::new(&[DataType::Byte, DataType::Short], CountRule::Any);
static YCBCR_COEFFICIENTS: MetaTag = MetaTag::new(RATIONAL, CountRule::Exactly(3))
    .with_default(DefaultRule::YCbCrCoefficients);
static YCBCR_SUB_SAMPLING: MetaTag =
    MetaTag::new(SHORT, CountRule::Exactly(2)).with_default(DefaultRule::YCbCrSubSampling);
static REFERENCE_BLACK_WHITE: MetaTag = MetaTag::new(RATIONAL, CountRule::Exactly(6))
    .with_default(DefaultRule::ReferenceBlackWhite);
static XMP: MetaTag = MetaTag::new(BYTES, CountRule::Any);
static VERSION_BYTES: MetaTag = MetaTag::new(UNDEFINED, CountRule::Exactly(4));

static STRIP_OFFSETS: MetaTag =
    MetaTag::new(OFFSET_ARRAY, CountRule::Chunks).with_role(TagRole::ChunkOffsets {
        counts: TagId::STRIP_BYTE_COUNTS,
        tiled: false,
    });
static STRIP_BYTE_COUNTS: MetaTag =
    MetaTag::new(OFFSET_ARRAY, CountRule::Chunks).with_role(TagRole::ChunkByteCounts {
        offsets: TagId::STRIP_OFFSETS,
    });
static TILE_OFFSETS: MetaTag =
    MetaTag::new(OFFSET_ARRAY, CountRule::Chunks).with_role(TagRole::ChunkOffsets {
        counts: TagId::TILE_BYTE_COUNTS,
        tiled: true,
    });
static TILE_BYTE_COUNTS: MetaTag =
    MetaTag::new(OFFSET_ARRAY, CountRule::Chunks).with_role(TagRole::ChunkByteCounts {
        offsets: TagId::TILE_OFFSETS,
    });
static FREE_SPACE: MetaTag = MetaTag::new(FREE_ARRAY, CountRule::Any).with_role(TagRole::SourceOnly);

static SUB_IFDS: MetaTag =
    MetaTag::new(IFD_POINTER, CountRule::Any).with_role(TagRole::SubIfd(IfdKind::Image));
static EXIF_IFD: MetaTag =
    MetaTag::new(IFD_POINTER, CountRule::Exactly(1)).with_role(TagRole::SubIfd(IfdKind::Exif));
static GPS_IFD: MetaTag =
    MetaTag::new(IFD_POINTER, CountRule::Exactly(1)).with_role(TagRole::SubIfd(IfdKind::Gps));
static INTEROP_IFD: MetaTag =
    MetaTag::new(IFD_POINTER, CountRule::Exactly(1)).with_role(TagRole::SubIfd(IfdKind::Interop));

/// The policy for `id`.
pub fn policy_for(id: TagId) -> &'static MetaTag {
    match id {
        TagId::NEW_SUBFILE_TYPE => &NEW_SUBFILE_TYPE,
        TagId::SUBFILE_TYPE
        | TagId::PHOTOMETRIC_INTERPRETATION
        | TagId::CELL_WIDTH
        | TagId::CELL_LENGTH
        | TagId::NUMBER_OF_INKS => &SCALAR_SHORT,
        TagId::IMAGE_WIDTH | TagId::IMAGE_LENGTH | TagId::TILE_WIDTH | TagId::TILE_LENGTH => {
            &SCALAR_SHORT_LONG
        }
        TagId::BITS_PER_SAMPLE => &BITS_PER_SAMPLE,
        TagId::COMPRESSION
        | TagId::THRESHHOLDING
        | TagId::FILL_ORDER
        | TagId::ORIENTATION
        | TagId::SAMPLES_PER_PIXEL
        | TagId::PLANAR_CONFIGURATION
        | TagId::PREDICTOR
        | TagId::INK_SET
        | TagId::YCBCR_POSITIONING => &SHORT_ONE,
        TagId::ROWS_PER_STRIP => &ROWS_PER_STRIP,
        TagId::STRIP_OFFSETS => &STRIP_OFFSETS,
        TagId::STRIP_BYTE_COUNTS => &STRIP_BYTE_COUNTS,
        TagId::TILE_OFFSETS => &TILE_OFFSETS,
        TagId::TILE_BYTE_COUNTS => &TILE_BYTE_COUNTS,
        TagId::FREE_OFFSETS | TagId::FREE_BYTE_COUNTS => &FREE_SPACE,
        TagId::MIN_SAMPLE_VALUE => &MIN_SAMPLE_VALUE,
        TagId::MAX_SAMPLE_VALUE => &MAX_SAMPLE_VALUE,
        TagId::SAMPLE_FORMAT => &SAMPLE_FORMAT,
        TagId::X_RESOLUTION | TagId::Y_RESOLUTION | TagId::X_POSITION | TagId::Y_POSITION => {
            &SCALAR_RATIONAL
        }
        TagId::RESOLUTION_UNIT | TagId::GRAY_RESPONSE_UNIT => &SHORT_TWO,
        TagId::T4_OPTIONS | TagId::T6_OPTIONS => &LONG_ZERO,
        TagId::PAGE_NUMBER | TagId::HALFTONE_HINTS => &SHORT_PAIR,
        TagId::GRAY_RESPONSE_CURVE | TagId::EXTRA_SAMPLES => &SHORT_LIST,
        TagId::TRANSFER_FUNCTION => &TRANSFER_FUNCTION,
        TagId::DATE_TIME => &DATE_TIME,
        TagId::DOCUMENT_NAME
        | TagId::IMAGE_DESCRIPTION
        | TagId::MAKE
        | TagId::MODEL
        | TagId::PAGE_NAME
        | TagId::SOFTWARE
        | TagId::ARTIST
        | TagId::HOST_COMPUTER
        | TagId::INK_NAMES
        | TagId::TARGET_PRINTER
        | TagId::COPYRIGHT => &TEXT,
        TagId::WHITE_POINT => &WHITE_POINT,
        TagId::PRIMARY_CHROMATICITIES => &PRIMARY_CHROMATICITIES,
        TagId::COLOR_MAP => &COLOR_MAP,
        TagId::DOT_RANGE => &DOT_RANGE,
        TagId::YCBCR_COEFFICIENTS => &YCBCR_COEFFICIENTS,
        TagId::YCBCR_SUB_SAMPLING => &YCBCR_SUB_SAMPLING,
        TagId::REFERENCE_BLACK_WHITE => &REFERENCE_BLACK_WHITE,
        TagId::JPEG_TABLES | TagId::ICC_PROFILE => &BLOB,
        TagId::XMP => &XMP,
        TagId::SUB_IFDS => &SUB_IFDS,
        TagId::EXIF_IFD => &EXIF_IFD,
        TagId::GPS_IFD => &GPS_IFD,
        TagId::INTEROPERABILITY_IFD => &INTEROP_IFD,
        TagId::EXIF_VERSION | TagId::FLASHPIX_VERSION => &VERSION_BYTES,
        _ => &GENERIC,
    }
}

// =============================================================================
// Tests
// =============================================================================
