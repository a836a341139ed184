use thiserror::Error;

use crate::tiff::TagId;

/// I/O errors that can occur when reading or writing the underlying byte stream
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// The source ran out of bytes before the requested range was read
    #[error("Unexpected end of data: requested {requested} bytes at offset {offset}, only {available} available")]
    UnexpectedEndOfData {
        offset: u64,
        requested: u64,
        available: u64,
    },

    /// Error reported by the underlying source
    #[error("Read error: {0}")]
    Read(String),

    /// Error reported by the output sink
    #[error("Write error: {0}")]
    Write(String),
}

/// Errors that can occur when parsing, repairing or writing TIFF directories
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading or writing the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or into the header)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Unknown field type in an IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Required tag is absent and has no default
    #[error("Missing required field: {0}")]
    MissingField(TagId),

    /// Tag is present with a data type the accessor cannot interpret
    #[error("Wrong type for {tag}: {found}")]
    WrongType { tag: TagId, found: String },

    /// Tag value is malformed
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: TagId, message: String },

    /// Negative value written to an unsigned rational field
    #[error("Negative value {0} cannot be stored as an unsigned rational")]
    NegativeRational(f64),

    /// Value exceeds the representable range of every accepted type
    #[error("Unsupported size: {0}")]
    UnsupportedSize(String),

    /// Recognized but unhandled combination
    #[error("Not implemented: {0}")]
    Unimplemented(String),

    /// Chunky data whose components have different bit depths
    #[error("Non-uniform sample depths in chunky storage: {0:?}")]
    NonUniformSampleDepths(Vec<u16>),

    /// No codec registered for a compression scheme that must be decoded
    #[error("No pixel codec registered for compression {0}")]
    MissingCodec(u16),

    /// The emit step diverged from the planned layout
    #[error("Layout mismatch: {0}")]
    LayoutMismatch(String),
}

/// Result type for TIFF operations
pub type Result<T> = std::result::Result<T, TiffError>;

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Read(err.to_string())
    }
}
