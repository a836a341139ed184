//! An opened TIFF file.
//!
//! Opening reads only the header. Directories are parsed on request, and
//! their tag values stay on disk until first accessed.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::io::ByteStreamReader;

use super::header::{TiffHeader, BIGTIFF_HEADER_SIZE};
use super::ifd::{IfdKind, TiffIfd};

/// Maximum number of top-level directories followed (safety limit)
pub const MAX_IFDS: usize = 100;

/// A TIFF or BigTIFF file with a parsed header.
#[derive(Debug, Clone)]
pub struct TiffDocument {
    reader: Arc<ByteStreamReader>,
    header: TiffHeader,
}

/// Open a TIFF or BigTIFF document.
///
/// The reader's byte order is set from the header.
///
/// # Errors
/// Any header failure: `FileTooSmall`, `InvalidMagic`, `InvalidVersion`,
/// `InvalidBigTiffOffsetSize` or `InvalidIfdOffset`.
pub fn open_tiff(mut reader: ByteStreamReader) -> Result<TiffDocument> {
    let available = reader.len().min(BIGTIFF_HEADER_SIZE as u64) as usize;
    let header_bytes = reader.read_exact(0, available)?;
    let header = TiffHeader::parse(&header_bytes, reader.len())?;
    reader.set_byte_order(header.byte_order);

    debug!(
        source = reader.identifier(),
        byte_order = ?header.byte_order,
        big_tiff = header.is_bigtiff,
        first_ifd = header.first_ifd_offset,
        "Opened TIFF"
    );

    Ok(TiffDocument {
        reader: Arc::new(reader),
        header,
    })
}

impl TiffDocument {
    /// Open a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        open_tiff(ByteStreamReader::open(path)?)
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn reader(&self) -> &Arc<ByteStreamReader> {
        &self.reader
    }

    /// Parse the first top-level directory.
    pub fn first_ifd(&self) -> Result<TiffIfd> {
        TiffIfd::parse(
            &self.reader,
            self.header.first_ifd_offset,
            self.header.is_bigtiff,
            IfdKind::Image,
        )
    }

    /// Parse the whole next-IFD chain.
    ///
    /// Stops after [`MAX_IFDS`] directories or when an offset repeats.
    pub fn ifds(&self) -> Result<Vec<TiffIfd>> {
        let mut ifds = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(self.first_ifd()?);

        while let Some(ifd) = current {
            if let Some(offset) = ifd.offset() {
                seen.insert(offset);
            }
            let next = ifd.next_ifd_offset();
            ifds.push(ifd);

            if next == 0 {
                break;
            }
            if seen.contains(&next) {
                warn!(offset = next, "IFD chain loops back, stopping");
                break;
            }
            if ifds.len() >= MAX_IFDS {
                warn!(limit = MAX_IFDS, "IFD chain exceeds limit, stopping");
                break;
            }
            current = ifds.last().map(TiffIfd::next_ifd).transpose()?.flatten();
        }

        Ok(ifds)
    }
}

// =============================================================================
// Tests
// =============================================================================
