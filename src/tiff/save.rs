//! Directory serialization.
//!
//! Saving is two passes over the directory tree:
//!
//! 1. **Plan**: assign every directory, out-of-line payload, strip or tile,
//!    offsets array and child directory a file offset, and encode every
//!    entry in the target byte order. Nothing is written.
//! 2. **Emit**: write the plan front to back, zero-filling up to each planned
//!    offset. Reaching a planned offset late is a [`LayoutMismatch`].
//!
//! Layout of one directory and everything it owns:
//!
//! ```text
//! directory | entry payloads | strips/tiles | arrays | child directories
//! ```
//!
//! [`LayoutMismatch`]: crate::error::TiffError::LayoutMismatch

use std::collections::BTreeMap;
use std::io::Write;

use tracing::{debug, trace};

use crate::codec::CodecRegistry;
use crate::error::{Result, TiffError};
use crate::io::TiffWriter;

use super::header::{ifd_size, value_offset_size, ByteOrder, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::ifd::TiffIfd;
use super::layout::{self, ArrayPlacement, StripPlan};
use super::meta::{policy_for, TagRole};
use super::tag::ChunkRef;
use super::tags::{DataType, TagId};
use super::values::Value;

// =============================================================================
// Options
// =============================================================================

/// Flavor of the file being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub byte_order: ByteOrder,
    pub big_tiff: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::LittleEndian,
            big_tiff: false,
        }
    }
}

impl WriteOptions {
    pub fn new(byte_order: ByteOrder, big_tiff: bool) -> Self {
        Self {
            byte_order,
            big_tiff,
        }
    }

    /// Same flavor as an existing file.
    pub fn matching(header: &TiffHeader) -> Self {
        Self::new(header.byte_order, header.is_bigtiff)
    }
}

// =============================================================================
// Plan
// =============================================================================

#[derive(Debug)]
struct PlannedEntry {
    id: TagId,
    data_type: DataType,
    count: u64,
    /// Encoded in the target byte order
    payload: Vec<u8>,
    placement: ArrayPlacement,
    /// Stored after the image data rather than with the other payloads
    after_data: bool,
}

#[derive(Debug)]
struct DirectoryPlan {
    offset: u64,
    entries: Vec<PlannedEntry>,
    next_ifd: u64,
    image_data: Option<(StripPlan, Vec<ChunkRef>)>,
    children: Vec<DirectoryPlan>,
    end: u64,
}

enum Draft<'a> {
    Value(Value),
    SubIfds {
        data_type: DataType,
        children: Vec<&'a TiffIfd>,
    },
}

/// Pointer type for sub-IFD entries in the target flavor.
fn sub_ifd_pointer_type(source: DataType, is_bigtiff: bool) -> DataType {
    let is_ifd = matches!(source, DataType::Ifd | DataType::Ifd8);
    match (is_ifd, is_bigtiff) {
        (true, false) => DataType::Ifd,
        (false, false) => DataType::Long,
        (true, true) => DataType::Ifd8,
        (false, true) => DataType::Long8,
    }
}

fn plan_directory(ifd: &TiffIfd, offset: u64, options: &WriteOptions) -> Result<DirectoryPlan> {
    let big = options.big_tiff;
    let order = options.byte_order;

    // Entries written from stored values or child directories
    let mut drafts: BTreeMap<TagId, Draft<'_>> = BTreeMap::new();
    for tag in ifd.tags() {
        let id = tag.id();
        let policy = policy_for(id);
        if !policy.should_write() {
            trace!(tag = %id, "Skipping tag not written from its stored value");
            continue;
        }
        match policy.role() {
            // Emitted from the layout plan
            TagRole::ChunkOffsets { .. } => {}
            TagRole::SubIfd(_) => {
                let unresolved = || TiffError::InvalidTagValue {
                    tag: id,
                    message: "sub-IFD pointers are not resolved".to_string(),
                };
                let children = ifd
                    .sub_ifd_refs(id)
                    .ok_or_else(unresolved)?
                    .iter()
                    .map(|r| r.resolved().ok_or_else(unresolved))
                    .collect::<Result<Vec<_>>>()?;
                let data_type = sub_ifd_pointer_type(tag.data_type(), big);
                drafts.insert(id, Draft::SubIfds { data_type, children });
            }
            _ => {
                let value = tag.value()?;
                let value = policy.select_type(id, &value, big)?;
                drafts.insert(id, Draft::Value(value));
            }
        }
    }

    let image_data = ifd.chunks()?;
    let entry_count = drafts.len() + if image_data.is_some() { 2 } else { 0 };
    let mut pos = offset + ifd_size(entry_count, big) as u64;

    // Out-of-line payloads follow the directory
    let mut entries = Vec::with_capacity(entry_count);
    for (&id, draft) in &drafts {
        let (data_type, count, payload) = match draft {
            Draft::Value(value) => (value.data_type(), value.count() as u64, value.to_bytes(order)),
            Draft::SubIfds {
                data_type,
                children,
            } => {
                let len = children.len() * data_type.size_in_bytes();
                (*data_type, children.len() as u64, vec![0; len])
            }
        };
        let reserved = policy_for(id).estimate_size(payload.len() as u64, pos, big);
        let placement = if reserved == 0 {
            ArrayPlacement::Inline
        } else {
            let at = pos + (pos & 1);
            pos += reserved;
            ArrayPlacement::At(at)
        };
        entries.push(PlannedEntry {
            id,
            data_type,
            count,
            payload,
            placement,
            after_data: false,
        });
    }

    // Strips or tiles, then their arrays
    let image_data = match image_data {
        Some((_, chunks)) => {
            let plan = layout::plan(ifd, pos, order, big)?.ok_or_else(|| {
                TiffError::LayoutMismatch("image data disappeared while planning".to_string())
            })?;
            pos = plan.end();

            for (id, value) in plan.overrides() {
                if let Some(entry) = entries.iter_mut().find(|e| e.id == *id) {
                    debug!(tag = %id, "Overriding entry for re-encoded image data");
                    entry.data_type = value.data_type();
                    entry.count = value.count() as u64;
                    entry.payload = value.to_bytes(order);
                    entry.placement = ArrayPlacement::Inline;
                }
            }

            let counts = plan.counts_value()?;
            let offsets = plan.offsets_value()?;
            for (id, value, placement) in [
                (plan.counts_tag, counts, plan.counts_at),
                (plan.offsets_tag, offsets, plan.offsets_at),
            ] {
                entries.push(PlannedEntry {
                    id,
                    data_type: value.data_type(),
                    count: value.count() as u64,
                    payload: value.to_bytes(order),
                    placement,
                    after_data: true,
                });
            }
            entries.sort_by_key(|e| e.id);

            Some((plan, chunks.to_vec()))
        }
        None => None,
    };

    // Child directories, then their pointers
    let mut children = Vec::new();
    for (&id, draft) in &drafts {
        let Draft::SubIfds {
            data_type,
            children: dirs,
        } = draft
        else {
            continue;
        };

        let mut child_offsets = Vec::with_capacity(dirs.len());
        for child in dirs {
            pos += pos & 1;
            let plan = plan_directory(child, pos, options)?;
            child_offsets.push(plan.offset);
            pos = plan.end;
            children.push(plan);
        }

        let pointers = Value::from_u64s(*data_type, &child_offsets).ok_or_else(|| {
            TiffError::UnsupportedSize(format!("{id} offsets need BigTIFF"))
        })?;
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.payload = pointers.to_bytes(order);
        }
    }

    Ok(DirectoryPlan {
        offset,
        entries,
        next_ifd: 0,
        image_data,
        children,
        end: pos,
    })
}

// =============================================================================
// Emit
// =============================================================================

fn seek_to<W: Write>(writer: &mut TiffWriter<W>, offset: u64, what: &str) -> Result<()> {
    if writer.pad_to(offset)? {
        Ok(())
    } else {
        Err(TiffError::LayoutMismatch(format!(
            "{what} planned at {offset} but {} bytes are already written",
            writer.position()
        )))
    }
}

fn write_offset<W: Write>(writer: &mut TiffWriter<W>, value: u64, big: bool) -> Result<()> {
    if big {
        writer.write_u64(value)?;
    } else {
        let value = u32::try_from(value).map_err(|_| {
            TiffError::UnsupportedSize(format!("offset {value} needs BigTIFF"))
        })?;
        writer.write_u32(value)?;
    }
    Ok(())
}

fn emit_directory<W: Write>(
    plan: &DirectoryPlan,
    codecs: &CodecRegistry,
    writer: &mut TiffWriter<W>,
    big: bool,
) -> Result<()> {
    seek_to(writer, plan.offset, "directory")?;

    let count = plan.entries.len() as u64;
    if big {
        writer.write_u64(count)?;
    } else {
        let count = u16::try_from(count).map_err(|_| {
            TiffError::UnsupportedSize(format!("{count} entries in one classic directory"))
        })?;
        writer.write_u16(count)?;
    }

    let field_size = value_offset_size(big);
    for entry in &plan.entries {
        writer.write_u16(entry.id.as_u16())?;
        writer.write_u16(entry.data_type.as_u16())?;
        write_offset(writer, entry.count, big).map_err(|_| {
            TiffError::UnsupportedSize(format!("{} elements in {}", entry.count, entry.id))
        })?;
        match entry.placement {
            ArrayPlacement::Inline => {
                writer.write_bytes(&entry.payload)?;
                writer.write_zeros((field_size - entry.payload.len()) as u64)?;
            }
            ArrayPlacement::At(at) => write_offset(writer, at, big)?,
        }
    }
    write_offset(writer, plan.next_ifd, big)?;

    emit_payloads(writer, plan.entries.iter().filter(|e| !e.after_data), "entry payload")?;

    if let Some((strips, chunks)) = &plan.image_data {
        emit_chunks(strips, chunks, codecs, writer)?;
        emit_payloads(writer, plan.entries.iter().filter(|e| e.after_data), "chunk array")?;
    }

    for child in &plan.children {
        emit_directory(child, codecs, writer, big)?;
    }
    Ok(())
}

/// Write out-of-line payloads in file order, which need not be tag order.
fn emit_payloads<'a, W: Write>(
    writer: &mut TiffWriter<W>,
    entries: impl Iterator<Item = &'a PlannedEntry>,
    what: &str,
) -> Result<()> {
    let mut placed: Vec<(u64, &[u8])> = entries
        .filter_map(|entry| match entry.placement {
            ArrayPlacement::At(at) => Some((at, entry.payload.as_slice())),
            ArrayPlacement::Inline => None,
        })
        .collect();
    placed.sort_by_key(|&(at, _)| at);

    for (at, payload) in placed {
        seek_to(writer, at, what)?;
        writer.write_bytes(payload)?;
    }
    Ok(())
}

fn emit_chunks<W: Write>(
    plan: &StripPlan,
    chunks: &[ChunkRef],
    codecs: &CodecRegistry,
    writer: &mut TiffWriter<W>,
) -> Result<()> {
    for (index, chunk) in chunks.iter().enumerate() {
        seek_to(writer, plan.offsets[index], "chunk")?;
        let stored = chunk.read()?;

        match &plan.swap {
            None => {
                if stored.len() as u64 != plan.sizes[index] {
                    return Err(TiffError::LayoutMismatch(format!(
                        "chunk {index} is {} bytes, planned {}",
                        stored.len(),
                        plan.sizes[index]
                    )));
                }
                writer.write_bytes(&stored)?;
            }
            Some(swap) => {
                let shape = swap.shapes[index];
                let mut raw = codecs.decompress(swap.compression, &stored, shape.len as usize)?;
                raw.resize(shape.len as usize, 0);
                let swapped = if shape.bits > 8 {
                    TiffIfd::byte_swap(&raw, shape.samples_per_row, shape.rows, shape.bits)?
                } else {
                    raw
                };
                writer.write_bytes(&swapped)?;
            }
        }
    }
    Ok(())
}

// =============================================================================
// Entry points
// =============================================================================

/// Write `ifds` as a chain of top-level directories.
///
/// Every directory is loaded into memory first. Returns the sink.
///
/// # Errors
/// - `UnsupportedSize` if a value or offset needs BigTIFF but `options`
///   asks for classic output
/// - `MissingCodec` if byte swapping needs a codec that is not registered
/// - `LayoutMismatch` if the emit pass diverges from the plan
pub fn save_tiff<W: Write>(
    ifds: &mut [TiffIfd],
    options: &WriteOptions,
    codecs: &CodecRegistry,
    sink: W,
) -> Result<W> {
    if ifds.is_empty() {
        return Err(TiffError::LayoutMismatch("no directories to write".to_string()));
    }
    for ifd in ifds.iter_mut() {
        ifd.load_into_memory()?;
    }

    let big = options.big_tiff;
    let header_size = if big {
        BIGTIFF_HEADER_SIZE
    } else {
        TIFF_HEADER_SIZE
    };
    let mut pos = header_size as u64;

    let mut plans: Vec<DirectoryPlan> = Vec::with_capacity(ifds.len());
    for ifd in ifds.iter() {
        pos += pos & 1;
        let plan = plan_directory(ifd, pos, options)?;
        pos = plan.end;
        plans.push(plan);
    }
    for i in 1..plans.len() {
        plans[i - 1].next_ifd = plans[i].offset;
    }

    let mut writer = TiffWriter::new(sink, options.byte_order);
    TiffHeader::new(options.byte_order, big, plans[0].offset).write(&mut writer)?;
    for plan in &plans {
        emit_directory(plan, codecs, &mut writer, big)?;
    }
    if writer.position() != pos {
        return Err(TiffError::LayoutMismatch(format!(
            "wrote {} bytes, planned {pos}",
            writer.position()
        )));
    }
    writer.flush()?;

    debug!(
        directories = plans.len(),
        bytes = pos,
        big_tiff = big,
        byte_order = ?options.byte_order,
        "Saved TIFF"
    );
    Ok(writer.into_inner())
}

impl TiffIfd {
    /// Write this directory as a single-image file.
    pub fn save<W: Write>(&mut self, sink: W, options: &WriteOptions) -> Result<W> {
        self.save_with_codecs(sink, options, &CodecRegistry::default())
    }

    /// Like [`save`](Self::save), with codecs for re-encoding image data.
    pub fn save_with_codecs<W: Write>(
        &mut self,
        sink: W,
        options: &WriteOptions,
        codecs: &CodecRegistry,
    ) -> Result<W> {
        save_tiff(std::slice::from_mut(self), options, codecs, sink)
    }
}

// =============================================================================
// Tests
// =============================================================================
