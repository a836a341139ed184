//! TIFF and BigTIFF directory engine.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. Values are decoded from the source order and re-encoded in the target
//!   order on save.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets and 12-byte entries,
//!   BigTIFF 64-bit offsets and 20-byte entries. Either can be read and either can be written.
//!
//! - **Lazy tags**: A parsed directory reads only its entry table. Out-of-line values are
//!   fetched on first access and cached.
//!
//! - **Policies**: Every tag id maps to a static [`MetaTag`] describing accepted types,
//!   counts, defaults and structural role (strip/tile arrays, sub-IFD pointers).
//!
//! - **Layout planning**: Saving computes a [`StripPlan`] per directory before writing a
//!   byte, so offsets arrays can be typed and placed exactly.

mod document;
mod header;
mod ifd;
pub mod layout;
mod meta;
mod save;
mod summary;
mod tag;
mod tags;
mod values;

pub use document::{open_tiff, TiffDocument, MAX_IFDS};
pub use header::{
    ifd_count_size, ifd_entry_size, ifd_size, value_offset_size, ByteOrder, TiffHeader,
    BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE,
};
pub use ifd::{IfdKind, ImageParams, TiffIfd, MAX_SUB_IFD_DEPTH};
pub use layout::{StripPlan, PAD_BOTTOM_TILES};
pub use meta::{policy_for, CountRule, DefaultRule, MetaTag, TagRole, GENERIC};
pub use save::{save_tiff, WriteOptions};
pub use summary::{preview, render_text, IfdSummary, TagSummary};
pub use tag::{ChunkRef, DiskTag, IfdRef, MemoryTag, Payload, Tag, TagSource, TagState};
pub use tags::{Compression, DataType, Photometric, PlanarConfiguration, TagId};
pub use values::{rat_to_ints, Value};
