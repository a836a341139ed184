//! TIFF data type and tag vocabulary.
//!
//! - [`DataType`] determines how a field's elements are encoded on disk
//! - [`TagId`] identifies a field; any 16-bit value is representable, the
//!   associated constants name the standard ones
//! - [`Compression`], [`Photometric`] and [`PlanarConfiguration`] name the
//!   values the layout engine branches on

use std::fmt;

// =============================================================================
// Data Types
// =============================================================================

/// On-disk element type of an IFD entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum DataType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit byte holding a 7-bit ASCII code, NUL terminated
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two LONGs: numerator, denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Opaque byte
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two SLONGs: numerator, denominator
    SRational = 10,
    /// IEEE single precision
    Float = 11,
    /// IEEE double precision
    Double = 12,
    /// 32-bit offset to a sub-IFD
    Ifd = 13,
    /// Unsigned 64-bit integer (BigTIFF only)
    Long8 = 16,
    /// Signed 64-bit integer (BigTIFF only)
    SLong8 = 17,
    /// 64-bit offset to a sub-IFD (BigTIFF only)
    Ifd8 = 18,
}

impl DataType {
    /// Every type, in numeric order.
    pub const ALL: [DataType; 16] = [
        DataType::Byte,
        DataType::Ascii,
        DataType::Short,
        DataType::Long,
        DataType::Rational,
        DataType::SByte,
        DataType::Undefined,
        DataType::SShort,
        DataType::SLong,
        DataType::SRational,
        DataType::Float,
        DataType::Double,
        DataType::Ifd,
        DataType::Long8,
        DataType::SLong8,
        DataType::Ifd8,
    ];

    /// Size of a single element in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::Byte | DataType::Ascii | DataType::SByte | DataType::Undefined => 1,
            DataType::Short | DataType::SShort => 2,
            DataType::Long | DataType::SLong | DataType::Float | DataType::Ifd => 4,
            DataType::Rational
            | DataType::SRational
            | DataType::Double
            | DataType::Long8
            | DataType::SLong8
            | DataType::Ifd8 => 8,
        }
    }

    /// Largest non-negative integer an element of this type can hold.
    ///
    /// For rationals this is the largest numerator; for floating types the
    /// largest integer that round-trips exactly.
    pub const fn max_representable(self) -> u64 {
        match self {
            DataType::Byte | DataType::Ascii | DataType::Undefined => u8::MAX as u64,
            DataType::SByte => i8::MAX as u64,
            DataType::Short => u16::MAX as u64,
            DataType::SShort => i16::MAX as u64,
            DataType::Long | DataType::Ifd | DataType::Rational => u32::MAX as u64,
            DataType::SLong | DataType::SRational => i32::MAX as u64,
            DataType::Float => 1 << 24,
            DataType::Double => 1 << 53,
            DataType::Long8 | DataType::Ifd8 => u64::MAX,
            DataType::SLong8 => i64::MAX as u64,
        }
    }

    /// Create a DataType from its numeric value.
    ///
    /// Returns `None` for unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        DataType::ALL.iter().copied().find(|t| *t as u16 == value)
    }

    /// Numeric value written to disk.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Types that only exist in BigTIFF files.
    #[inline]
    pub const fn is_bigtiff_only(self) -> bool {
        matches!(self, DataType::Long8 | DataType::SLong8 | DataType::Ifd8)
    }

    /// Integer types, signed or unsigned, including IFD pointers.
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Byte
                | DataType::Short
                | DataType::Long
                | DataType::SByte
                | DataType::SShort
                | DataType::SLong
                | DataType::Ifd
                | DataType::Long8
                | DataType::SLong8
                | DataType::Ifd8
        )
    }

    /// Types whose elements can be negative.
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            DataType::SByte
                | DataType::SShort
                | DataType::SLong
                | DataType::SLong8
                | DataType::SRational
                | DataType::Float
                | DataType::Double
        )
    }

    /// Rational and floating-point types.
    #[inline]
    pub const fn is_real(self) -> bool {
        matches!(
            self,
            DataType::Rational | DataType::SRational | DataType::Float | DataType::Double
        )
    }

    /// Byte-oriented blob types.
    #[inline]
    pub const fn is_blob(self) -> bool {
        matches!(self, DataType::Byte | DataType::Undefined | DataType::Ascii)
    }

    /// Inline value threshold in bytes.
    #[inline]
    pub const fn inline_threshold(is_bigtiff: bool) -> u64 {
        if is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Check if `count` elements of this type fit in the entry's value field.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        (self.size_in_bytes() as u64).saturating_mul(count) <= Self::inline_threshold(is_bigtiff)
    }

    /// Short uppercase name as used in the TIFF specification.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::Byte => "BYTE",
            DataType::Ascii => "ASCII",
            DataType::Short => "SHORT",
            DataType::Long => "LONG",
            DataType::Rational => "RATIONAL",
            DataType::SByte => "SBYTE",
            DataType::Undefined => "UNDEFINED",
            DataType::SShort => "SSHORT",
            DataType::SLong => "SLONG",
            DataType::SRational => "SRATIONAL",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Ifd => "IFD",
            DataType::Long8 => "LONG8",
            DataType::SLong8 => "SLONG8",
            DataType::Ifd8 => "IFD8",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Tag IDs
// =============================================================================

/// A TIFF field identifier.
///
/// Vendor and private tags are carried through unchanged, so this is a
/// newtype rather than a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u16);

macro_rules! tag_ids {
    ($($(#[$doc:meta])* $name:ident = $value:literal, $display:literal;)*) => {
        impl TagId {
            $($(#[$doc])* pub const $name: TagId = TagId($value);)*

            /// Human-readable name, if this is a known tag.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some($display),)*
                    _ => None,
                }
            }
        }
    };
}

tag_ids! {
    // -------------------------------------------------------------------------
    // Baseline and extension tags
    // -------------------------------------------------------------------------
    NEW_SUBFILE_TYPE = 254, "NewSubfileType";
    /// Deprecated predecessor of NewSubfileType
    SUBFILE_TYPE = 255, "SubfileType";
    IMAGE_WIDTH = 256, "ImageWidth";
    IMAGE_LENGTH = 257, "ImageLength";
    BITS_PER_SAMPLE = 258, "BitsPerSample";
    COMPRESSION = 259, "Compression";
    PHOTOMETRIC_INTERPRETATION = 262, "PhotometricInterpretation";
    THRESHHOLDING = 263, "Threshholding";
    CELL_WIDTH = 264, "CellWidth";
    CELL_LENGTH = 265, "CellLength";
    FILL_ORDER = 266, "FillOrder";
    DOCUMENT_NAME = 269, "DocumentName";
    IMAGE_DESCRIPTION = 270, "ImageDescription";
    MAKE = 271, "Make";
    MODEL = 272, "Model";
    STRIP_OFFSETS = 273, "StripOffsets";
    ORIENTATION = 274, "Orientation";
    SAMPLES_PER_PIXEL = 277, "SamplesPerPixel";
    ROWS_PER_STRIP = 278, "RowsPerStrip";
    STRIP_BYTE_COUNTS = 279, "StripByteCounts";
    MIN_SAMPLE_VALUE = 280, "MinSampleValue";
    MAX_SAMPLE_VALUE = 281, "MaxSampleValue";
    X_RESOLUTION = 282, "XResolution";
    Y_RESOLUTION = 283, "YResolution";
    PLANAR_CONFIGURATION = 284, "PlanarConfiguration";
    PAGE_NAME = 285, "PageName";
    X_POSITION = 286, "XPosition";
    Y_POSITION = 287, "YPosition";
    FREE_OFFSETS = 288, "FreeOffsets";
    FREE_BYTE_COUNTS = 289, "FreeByteCounts";
    GRAY_RESPONSE_UNIT = 290, "GrayResponseUnit";
    GRAY_RESPONSE_CURVE = 291, "GrayResponseCurve";
    T4_OPTIONS = 292, "T4Options";
    T6_OPTIONS = 293, "T6Options";
    RESOLUTION_UNIT = 296, "ResolutionUnit";
    PAGE_NUMBER = 297, "PageNumber";
    TRANSFER_FUNCTION = 301, "TransferFunction";
    SOFTWARE = 305, "Software";
    DATE_TIME = 306, "DateTime";
    ARTIST = 315, "Artist";
    HOST_COMPUTER = 316, "HostComputer";
    PREDICTOR = 317, "Predictor";
    WHITE_POINT = 318, "WhitePoint";
    PRIMARY_CHROMATICITIES = 319, "PrimaryChromaticities";
    COLOR_MAP = 320, "ColorMap";
    HALFTONE_HINTS = 321, "HalftoneHints";
    TILE_WIDTH = 322, "TileWidth";
    TILE_LENGTH = 323, "TileLength";
    TILE_OFFSETS = 324, "TileOffsets";
    TILE_BYTE_COUNTS = 325, "TileByteCounts";
    SUB_IFDS = 330, "SubIFDs";
    INK_SET = 332, "InkSet";
    INK_NAMES = 333, "InkNames";
    NUMBER_OF_INKS = 334, "NumberOfInks";
    DOT_RANGE = 336, "DotRange";
    TARGET_PRINTER = 337, "TargetPrinter";
    EXTRA_SAMPLES = 338, "ExtraSamples";
    SAMPLE_FORMAT = 339, "SampleFormat";
    S_MIN_SAMPLE_VALUE = 340, "SMinSampleValue";
    S_MAX_SAMPLE_VALUE = 341, "SMaxSampleValue";
    TRANSFER_RANGE = 342, "TransferRange";
    JPEG_TABLES = 347, "JPEGTables";
    YCBCR_COEFFICIENTS = 529, "YCbCrCoefficients";
    YCBCR_SUB_SAMPLING = 530, "YCbCrSubSampling";
    YCBCR_POSITIONING = 531, "YCbCrPositioning";
    REFERENCE_BLACK_WHITE = 532, "ReferenceBlackWhite";
    XMP = 700, "XMP";
    COPYRIGHT = 33432, "Copyright";
    IPTC = 33723, "IPTC";
    PHOTOSHOP = 34377, "Photoshop";
    EXIF_IFD = 34665, "ExifIFD";
    ICC_PROFILE = 34675, "ICCProfile";
    GPS_IFD = 34853, "GPSIFD";

    // -------------------------------------------------------------------------
    // EXIF private directory
    // -------------------------------------------------------------------------
    EXPOSURE_TIME = 33434, "ExposureTime";
    F_NUMBER = 33437, "FNumber";
    EXPOSURE_PROGRAM = 34850, "ExposureProgram";
    ISO_SPEED_RATINGS = 34855, "ISOSpeedRatings";
    EXIF_VERSION = 36864, "ExifVersion";
    DATE_TIME_ORIGINAL = 36867, "DateTimeOriginal";
    DATE_TIME_DIGITIZED = 36868, "DateTimeDigitized";
    SHUTTER_SPEED_VALUE = 37377, "ShutterSpeedValue";
    APERTURE_VALUE = 37378, "ApertureValue";
    EXPOSURE_BIAS_VALUE = 37380, "ExposureBiasValue";
    FOCAL_LENGTH = 37386, "FocalLength";
    MAKER_NOTE = 37500, "MakerNote";
    USER_COMMENT = 37510, "UserComment";
    FLASHPIX_VERSION = 40960, "FlashpixVersion";
    COLOR_SPACE = 40961, "ColorSpace";
    PIXEL_X_DIMENSION = 40962, "PixelXDimension";
    PIXEL_Y_DIMENSION = 40963, "PixelYDimension";
    INTEROPERABILITY_IFD = 40965, "InteroperabilityIFD";

    // -------------------------------------------------------------------------
    // GPS private directory
    // -------------------------------------------------------------------------
    GPS_VERSION_ID = 0, "GPSVersionID";
    GPS_LATITUDE_REF = 1, "GPSLatitudeRef";
    GPS_LATITUDE = 2, "GPSLatitude";
    GPS_LONGITUDE_REF = 3, "GPSLongitudeRef";
    GPS_LONGITUDE = 4, "GPSLongitude";
    GPS_ALTITUDE_REF = 5, "GPSAltitudeRef";
    GPS_ALTITUDE = 6, "GPSAltitude";
}

impl TagId {
    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for TagId {
    fn from(value: u16) -> Self {
        TagId(value)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "Unknown ({})", self.0),
        }
    }
}

// =============================================================================
// Field Values
// =============================================================================

/// TIFF compression scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    /// No compression
    None = 1,
    /// CCITT modified Huffman RLE
    CcittRle = 2,
    /// CCITT Group 3 fax
    CcittFax3 = 3,
    /// CCITT Group 4 fax
    CcittFax4 = 4,
    /// LZW
    Lzw = 5,
    /// "Old-style" JPEG
    OldJpeg = 6,
    /// JPEG
    Jpeg = 7,
    /// Deflate/zlib
    Deflate = 8,
    /// JBIG
    Jbig = 9,
    /// PackBits run-length
    PackBits = 32773,
    /// Adobe Deflate
    AdobeDeflate = 32946,
    /// JPEG 2000
    Jpeg2000 = 33003,
    /// JPEG 2000 (Leadtools)
    Jpx = 34712,
}

impl Compression {
    /// Create a Compression from its numeric value.
    ///
    /// Returns `None` for unrecognized compression values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            2 => Some(Compression::CcittRle),
            3 => Some(Compression::CcittFax3),
            4 => Some(Compression::CcittFax4),
            5 => Some(Compression::Lzw),
            6 => Some(Compression::OldJpeg),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            9 => Some(Compression::Jbig),
            32773 => Some(Compression::PackBits),
            32946 => Some(Compression::AdobeDeflate),
            33003 => Some(Compression::Jpeg2000),
            34712 => Some(Compression::Jpx),
            _ => None,
        }
    }

    /// Lossy transform codecs whose payload is never byte swapped.
    ///
    /// Their samples are not stored in file byte order, so re-encoding across
    /// endianness copies them verbatim.
    #[inline]
    pub const fn is_jpeg_family(self) -> bool {
        matches!(
            self,
            Compression::OldJpeg | Compression::Jpeg | Compression::Jpeg2000 | Compression::Jpx
        )
    }

    /// Get a human-readable name for the compression scheme.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::CcittRle => "CCITT RLE",
            Compression::CcittFax3 => "CCITT Fax3",
            Compression::CcittFax4 => "CCITT Fax4",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::Jbig => "JBIG",
            Compression::PackBits => "PackBits",
            Compression::AdobeDeflate => "Adobe Deflate",
            Compression::Jpeg2000 => "JPEG 2000",
            Compression::Jpx => "JPX",
        }
    }
}

/// Photometric interpretation values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Photometric {
    WhiteIsZero = 0,
    BlackIsZero = 1,
    Rgb = 2,
    Palette = 3,
    TransparencyMask = 4,
    Separated = 5,
    YCbCr = 6,
    CieLab = 8,
}

impl Photometric {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Photometric::WhiteIsZero),
            1 => Some(Photometric::BlackIsZero),
            2 => Some(Photometric::Rgb),
            3 => Some(Photometric::Palette),
            4 => Some(Photometric::TransparencyMask),
            5 => Some(Photometric::Separated),
            6 => Some(Photometric::YCbCr),
            8 => Some(Photometric::CieLab),
            _ => None,
        }
    }
}

/// How the components of each pixel are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PlanarConfiguration {
    /// Components interleaved per pixel
    Chunky = 1,
    /// Each component in its own plane
    Planar = 2,
}

impl PlanarConfiguration {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(PlanarConfiguration::Chunky),
            2 => Some(PlanarConfiguration::Planar),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
