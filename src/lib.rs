//! # tiff-ifd
//!
//! A TIFF and BigTIFF tag and directory engine.
//!
//! This library parses Image File Directories lazily, exposes typed tag
//! values through per-tag policies, and writes directories back bit-exactly.
//! It can switch between byte orders and between classic TIFF and BigTIFF.
//! Pixel data is never decoded, except when a byte-order change forces
//! multi-byte samples to be swapped.
//!
//! ## Architecture
//!
//! - [`io`] - Shared random-access reader and byte-order-aware writer
//! - [`tiff`] - Header, tags, policies, directories, layout planning and saving
//! - [`codec`] - Decompression collaborators used when swapping samples
//! - [`config`] - CLI configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiff_ifd::{TiffDocument, TagId, WriteOptions, ByteOrder};
//!
//! # fn main() -> Result<(), tiff_ifd::TiffError> {
//! let doc = TiffDocument::open("scan.tif")?;
//! let mut ifd = doc.first_ifd()?;
//! println!("width = {}", ifd.get_u64(TagId::IMAGE_WIDTH)?);
//!
//! let options = WriteOptions::new(ByteOrder::BigEndian, true);
//! let bytes = ifd.save(Vec::new(), &options)?;
//! std::fs::write("scan-big.tif", bytes).ok();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod io;
pub mod tiff;

// Re-export commonly used types
pub use codec::{CodecRegistry, PixelCodec, Uncompressed};
pub use config::{ByteOrderArg, Cli, Command, DumpConfig, FormatArg, RewriteConfig};
pub use error::{IoError, Result, TiffError};
pub use io::{ByteSource, ByteStreamReader, TiffWriter};
pub use tiff::{
    open_tiff, policy_for, render_text, save_tiff, ByteOrder, ChunkRef, Compression, DataType,
    DiskTag, IfdKind, IfdRef, IfdSummary, ImageParams, MemoryTag, MetaTag, Payload, StripPlan,
    Tag, TagId, TagState, TagSummary, TiffDocument, TiffHeader, TiffIfd, Value, WriteOptions,
};
