//! Image File Directory model.
//!
//! A [`TiffIfd`] is an ordered map of tags plus the flavor of the file it
//! came from. Directories move one way through their lifecycle:
//!
//! ```text
//! parsed (lazy disk tags) -> repaired -> loaded into memory -> saved
//! ```
//!
//! Loading replaces every disk tag with an in-memory tag and binds strip and
//! tile offsets to [`ChunkRef`]s, so the writer never depends on the source
//! file's layout.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{IoError, Result, TiffError};
use crate::io::ByteStreamReader;

use super::header::{ifd_count_size, ifd_entry_size, ByteOrder, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::meta::{policy_for, TagRole};
use super::tag::{check_extent, ChunkRef, DiskTag, IfdRef, MemoryTag, Payload, Tag};
use super::tags::{DataType, TagId};
use super::values::Value;

/// Maximum nesting of sub-IFD pointers followed from one directory.
pub const MAX_SUB_IFD_DEPTH: usize = 8;

// =============================================================================
// Directory kind
// =============================================================================

/// Which vocabulary a directory uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfdKind {
    /// Main image or sub-image
    Image,
    Exif,
    Gps,
    Interop,
}

impl IfdKind {
    pub const fn name(self) -> &'static str {
        match self {
            IfdKind::Image => "image",
            IfdKind::Exif => "exif",
            IfdKind::Gps => "gps",
            IfdKind::Interop => "interop",
        }
    }
}

impl fmt::Display for IfdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Image parameters
// =============================================================================

/// Image geometry and sample layout, with TIFF defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParams {
    pub width: u64,
    pub height: u64,
    /// One entry per sample
    pub bits_per_sample: Vec<u16>,
    pub samples_per_pixel: u16,
    pub planar_configuration: u16,
    pub compression: u16,
    pub photometric: Option<u16>,
    pub predictor: u16,
    pub rows_per_strip: u64,
    pub tile_width: Option<u64>,
    pub tile_height: Option<u64>,
    pub ycbcr_subsampling: [u16; 2],
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            bits_per_sample: vec![1],
            samples_per_pixel: 1,
            planar_configuration: 1,
            compression: 1,
            photometric: None,
            predictor: 1,
            rows_per_strip: u32::MAX as u64,
            tile_width: None,
            tile_height: None,
            ycbcr_subsampling: [2, 2],
        }
    }
}

impl ImageParams {
    pub fn is_tiled(&self) -> bool {
        self.tile_width.is_some() && self.tile_height.is_some()
    }

    /// Components stored in separate planes.
    pub fn is_planar(&self) -> bool {
        self.planar_configuration == 2 && self.samples_per_pixel > 1
    }

    /// Chroma-subsampled YCbCr data.
    pub fn is_subsampled_ycbcr(&self) -> bool {
        self.photometric == Some(6) && self.ycbcr_subsampling != [1, 1]
    }

    /// Width of one strip or tile in pixels.
    pub fn chunk_width(&self) -> u64 {
        match self.tile_width {
            Some(tw) if self.is_tiled() => tw.max(1),
            _ => self.width,
        }
    }

    /// Height of one full strip or tile in rows.
    pub fn chunk_height(&self) -> u64 {
        match self.tile_height {
            Some(th) if self.is_tiled() => th.max(1),
            _ => self.rows_per_strip.min(self.height).max(1),
        }
    }

    pub fn chunks_across(&self) -> u64 {
        if self.is_tiled() {
            self.width.div_ceil(self.chunk_width())
        } else {
            1
        }
    }

    pub fn chunks_down(&self) -> u64 {
        self.height.div_ceil(self.chunk_height())
    }

    pub fn planes(&self) -> u64 {
        if self.is_planar() {
            self.samples_per_pixel as u64
        } else {
            1
        }
    }

    pub fn chunks_per_plane(&self) -> u64 {
        self.chunks_across().saturating_mul(self.chunks_down())
    }

    /// Number of strips or tiles, once the dimensions are known.
    pub fn chunk_count(&self) -> Option<u64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(self.chunks_per_plane().saturating_mul(self.planes()))
    }

    /// Sum of the per-sample bit depths.
    pub fn bits_per_pixel(&self) -> u64 {
        self.bits_per_sample.iter().map(|&b| b as u64).sum()
    }
}

// =============================================================================
// TiffIfd
// =============================================================================

/// One Image File Directory.
#[derive(Debug, Clone)]
pub struct TiffIfd {
    kind: IfdKind,
    byte_order: ByteOrder,
    is_bigtiff: bool,
    tags: BTreeMap<TagId, Tag>,
    source: Option<Arc<ByteStreamReader>>,
    /// Offset this directory was parsed from
    offset: Option<u64>,
    next_ifd_offset: u64,
    in_memory: bool,
    depth: usize,
}

impl TiffIfd {
    /// Create an empty in-memory directory.
    ///
    /// `byte_order` is the order of any strip or tile data attached later.
    pub fn new(kind: IfdKind, byte_order: ByteOrder, is_bigtiff: bool) -> Self {
        Self {
            kind,
            byte_order,
            is_bigtiff,
            tags: BTreeMap::new(),
            source: None,
            offset: None,
            next_ifd_offset: 0,
            in_memory: true,
            depth: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Parsing
    // -------------------------------------------------------------------------

    /// Parse the directory at `offset`.
    ///
    /// Entries with unknown field types are skipped unless they carry strip,
    /// tile or sub-IFD structure, which cannot be laid out without a type.
    ///
    /// # Errors
    /// - `InvalidIfdOffset` if `offset` is inside the header or past the end
    /// - `UnexpectedEndOfData` if the entry table is truncated
    /// - `UnknownFieldType` for a structural entry with an unknown type
    pub fn parse(
        reader: &Arc<ByteStreamReader>,
        offset: u64,
        is_bigtiff: bool,
        kind: IfdKind,
    ) -> Result<Self> {
        Self::parse_at_depth(reader, offset, is_bigtiff, kind, 0)
    }

    fn parse_at_depth(
        reader: &Arc<ByteStreamReader>,
        offset: u64,
        is_bigtiff: bool,
        kind: IfdKind,
        depth: usize,
    ) -> Result<Self> {
        let header_size = (if is_bigtiff {
            BIGTIFF_HEADER_SIZE
        } else {
            TIFF_HEADER_SIZE
        }) as u64;
        if offset < header_size || offset >= reader.len() {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let order = reader.byte_order();
        let count_size = ifd_count_size(is_bigtiff) as u64;
        let entry_size = ifd_entry_size(is_bigtiff) as u64;

        let entry_count = if is_bigtiff {
            reader.read_u64(offset)?
        } else {
            reader.read_u16(offset)? as u64
        };

        let table_start = offset + count_size;
        let available = reader.len() - table_start.min(reader.len());
        let table_len = entry_count
            .checked_mul(entry_size)
            .filter(|&len| len <= available)
            .ok_or(IoError::UnexpectedEndOfData {
                offset: table_start,
                requested: entry_count.saturating_mul(entry_size),
                available,
            })?;
        let table = reader.read_exact(table_start, table_len as usize)?;

        let mut tags = BTreeMap::new();
        for entry in table.chunks_exact(entry_size as usize) {
            let id = TagId(order.read_u16(&entry[0..2]));
            let type_code = order.read_u16(&entry[2..4]);

            let Some(data_type) = DataType::from_u16(type_code) else {
                let policy = policy_for(id);
                if policy.is_offset_data() || policy.replaced_by().is_some() {
                    return Err(TiffError::UnknownFieldType(type_code));
                }
                warn!(tag = %id, type_code, "Skipping entry with unknown field type");
                continue;
            };

            let (count, raw) = if is_bigtiff {
                (order.read_u64(&entry[4..12]), &entry[12..20])
            } else {
                (order.read_u32(&entry[4..8]) as u64, &entry[8..12])
            };

            if tags.contains_key(&id) {
                warn!(tag = %id, "Ignoring duplicate entry");
                continue;
            }
            let tag = DiskTag::new(id, data_type, count, raw, Arc::clone(reader), is_bigtiff);
            tags.insert(id, Tag::Disk(tag));
        }

        let next_pos = table_start + table_len;
        let next_ifd_offset = if is_bigtiff {
            reader.read_u64(next_pos)?
        } else {
            reader.read_u32(next_pos)? as u64
        };

        let mut ifd = Self {
            kind,
            byte_order: order,
            is_bigtiff,
            tags,
            source: Some(Arc::clone(reader)),
            offset: Some(offset),
            next_ifd_offset,
            in_memory: false,
            depth,
        };
        ifd.apply_count_hints();

        debug!(
            offset,
            kind = %kind,
            entries = ifd.tags.len(),
            next = next_ifd_offset,
            "Parsed IFD"
        );
        Ok(ifd)
    }

    /// Give zero-count entries the count their policy implies.
    fn apply_count_hints(&mut self) {
        if self.kind != IfdKind::Image {
            return;
        }

        let zero: Vec<TagId> = self
            .tags
            .iter()
            .filter(|(_, tag)| matches!(tag, Tag::Disk(d) if d.declared_count() == 0))
            .map(|(&id, _)| id)
            .collect();
        if zero.is_empty() {
            return;
        }

        // Detach them so computing the parameters does not resolve them early
        let mut pending: Vec<(TagId, Tag)> = zero
            .iter()
            .filter_map(|id| self.tags.remove_entry(id))
            .collect();
        let params = self.image_params().unwrap_or_default();

        for (id, tag) in pending.iter_mut() {
            if let (Tag::Disk(disk), Some(hint)) = (tag, policy_for(*id).fixed_count(&params)) {
                debug!(tag = %id, hint, "Zero-count entry takes its count from the tag policy");
                disk.set_count_hint(hint);
            }
        }
        self.tags.extend(pending);
    }

    /// Parse the directory this one chains to, if any.
    pub fn next_ifd(&self) -> Result<Option<TiffIfd>> {
        if self.next_ifd_offset == 0 {
            return Ok(None);
        }
        let reader = self.source.as_ref().ok_or(TiffError::InvalidIfdOffset(self.next_ifd_offset))?;
        TiffIfd::parse(reader, self.next_ifd_offset, self.is_bigtiff, IfdKind::Image).map(Some)
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    pub fn kind(&self) -> IfdKind {
        self.kind
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn is_bigtiff(&self) -> bool {
        self.is_bigtiff
    }

    /// Inline value threshold of the source flavor.
    pub fn inline_threshold(&self) -> u64 {
        DataType::inline_threshold(self.is_bigtiff)
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn next_ifd_offset(&self) -> u64 {
        self.next_ifd_offset
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    pub fn source(&self) -> Option<&Arc<ByteStreamReader>> {
        self.source.as_ref()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    // -------------------------------------------------------------------------
    // Tag access
    // -------------------------------------------------------------------------

    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.tags.contains_key(&id)
    }

    /// Tags in ascending ID order.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    /// Value of `id`, coerced to an accepted type, or its policy default.
    ///
    /// # Errors
    /// - `MissingField` if the tag is absent and has no default
    /// - `WrongType` if no accepted type can represent the stored value
    pub fn get_required(&self, id: TagId) -> Result<Cow<'_, Value>> {
        let policy = policy_for(id);
        match self.tags.get(&id) {
            Some(tag) => {
                let value = tag.value()?;
                if policy.accepts(value.data_type()) {
                    return Ok(value);
                }
                policy
                    .coerce(&value)
                    .map(Cow::Owned)
                    .ok_or_else(|| TiffError::WrongType {
                        tag: id,
                        found: value.data_type().to_string(),
                    })
            }
            None => {
                let params = self.image_params().unwrap_or_default();
                policy
                    .default_value(&params)
                    .map(Cow::Owned)
                    .ok_or(TiffError::MissingField(id))
            }
        }
    }

    /// Like [`get_required`](Self::get_required), falling back to `default`
    /// instead of failing with `MissingField`.
    pub fn get_optional(&self, id: TagId, default: Value) -> Result<Cow<'_, Value>> {
        match self.get_required(id) {
            Err(TiffError::MissingField(_)) => Ok(Cow::Owned(default)),
            other => other,
        }
    }

    /// All values of `id` as unsigned integers.
    pub fn get_u64s(&self, id: TagId) -> Result<Vec<u64>> {
        let value = self.get_required(id)?;
        value.to_u64s().ok_or_else(|| TiffError::WrongType {
            tag: id,
            found: value.data_type().to_string(),
        })
    }

    /// First value of `id` as an unsigned integer.
    pub fn get_u64(&self, id: TagId) -> Result<u64> {
        self.get_u64s(id)?
            .first()
            .copied()
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: id,
                message: "no elements".to_string(),
            })
    }

    fn tag_u64(&self, id: TagId) -> Result<Option<u64>> {
        self.get(id).map(|tag| tag.as_u64()).transpose()
    }

    /// Image parameters with TIFF defaults for absent tags.
    pub fn image_params(&self) -> Result<ImageParams> {
        let defaults = ImageParams::default();

        let samples_per_pixel = self
            .tag_u64(TagId::SAMPLES_PER_PIXEL)?
            .unwrap_or(1)
            .clamp(1, u16::MAX as u64) as u16;

        let mut bits_per_sample = match self.get(TagId::BITS_PER_SAMPLE) {
            Some(tag) => tag.as_u16s()?,
            None => Vec::new(),
        };
        if bits_per_sample.is_empty() {
            bits_per_sample = defaults.bits_per_sample.clone();
        }
        if bits_per_sample.len() < samples_per_pixel as usize {
            // Some writers store a single depth for every sample
            let last = bits_per_sample[bits_per_sample.len() - 1];
            bits_per_sample.resize(samples_per_pixel as usize, last);
        }

        let ycbcr_subsampling = match self.get(TagId::YCBCR_SUB_SAMPLING) {
            Some(tag) => match tag.as_u16s()?.as_slice() {
                [h, v, ..] => [*h, *v],
                _ => defaults.ycbcr_subsampling,
            },
            None => defaults.ycbcr_subsampling,
        };

        let narrow = |v: Option<u64>, default: u16| v.map_or(default, |v| v.min(u16::MAX as u64) as u16);

        Ok(ImageParams {
            width: self.tag_u64(TagId::IMAGE_WIDTH)?.unwrap_or(0),
            height: self.tag_u64(TagId::IMAGE_LENGTH)?.unwrap_or(0),
            bits_per_sample,
            samples_per_pixel,
            planar_configuration: narrow(
                self.tag_u64(TagId::PLANAR_CONFIGURATION)?,
                defaults.planar_configuration,
            ),
            compression: narrow(self.tag_u64(TagId::COMPRESSION)?, defaults.compression),
            photometric: self
                .tag_u64(TagId::PHOTOMETRIC_INTERPRETATION)?
                .map(|v| v.min(u16::MAX as u64) as u16),
            predictor: narrow(self.tag_u64(TagId::PREDICTOR)?, defaults.predictor),
            rows_per_strip: self
                .tag_u64(TagId::ROWS_PER_STRIP)?
                .unwrap_or(defaults.rows_per_strip),
            tile_width: self.tag_u64(TagId::TILE_WIDTH)?,
            tile_height: self.tag_u64(TagId::TILE_LENGTH)?,
            ycbcr_subsampling,
        })
    }

    // -------------------------------------------------------------------------
    // Sub-IFDs
    // -------------------------------------------------------------------------

    /// Parse the directories `id` points to, recursively, as `kind`.
    ///
    /// The tag becomes an in-memory pointer tag whose slots hold the parsed
    /// directories. Slots already resolved are left alone.
    pub fn resolve_sub_ifds(&mut self, id: TagId, kind: IfdKind) -> Result<&[IfdRef]> {
        let (data_type, mut refs) = match self.tags.get_mut(&id) {
            None => return Err(TiffError::MissingField(id)),
            Some(Tag::Memory(memory)) => match memory.payload_mut() {
                Payload::SubIfds { data_type, refs } => (*data_type, std::mem::take(refs)),
                Payload::Value(value) => (value.data_type(), offsets_to_refs(id, value)?),
                Payload::Chunks(_) => {
                    return Err(TiffError::WrongType {
                        tag: id,
                        found: "strip or tile data".to_string(),
                    })
                }
            },
            Some(tag @ Tag::Disk(_)) => {
                let value = tag.value()?.into_owned();
                (tag.data_type(), offsets_to_refs(id, &value)?)
            }
        };

        let outcome = self.resolve_refs(id, kind, &mut refs);
        self.tags.insert(
            id,
            Tag::Memory(MemoryTag::new(id, Payload::SubIfds { data_type, refs })),
        );
        outcome?;

        Ok(self.sub_ifd_refs(id).unwrap_or(&[]))
    }

    fn resolve_refs(&self, id: TagId, kind: IfdKind, refs: &mut [IfdRef]) -> Result<()> {
        for slot in refs.iter_mut() {
            let IfdRef::Unresolved(offset) = *slot else {
                continue;
            };
            if self.depth + 1 > MAX_SUB_IFD_DEPTH {
                return Err(TiffError::InvalidTagValue {
                    tag: id,
                    message: format!("sub-IFD nesting deeper than {MAX_SUB_IFD_DEPTH}"),
                });
            }
            if Some(offset) == self.offset {
                return Err(TiffError::InvalidIfdOffset(offset));
            }
            let reader = self.source.as_ref().ok_or_else(|| TiffError::InvalidTagValue {
                tag: id,
                message: "no source file to resolve sub-IFDs from".to_string(),
            })?;

            let mut child =
                TiffIfd::parse_at_depth(reader, offset, self.is_bigtiff, kind, self.depth + 1)?;
            child.resolve_all_sub_ifds()?;
            *slot = IfdRef::Resolved(Box::new(child));
        }
        Ok(())
    }

    /// Resolve every pointer tag in this directory and its children.
    pub fn resolve_all_sub_ifds(&mut self) -> Result<()> {
        let pointers: Vec<(TagId, IfdKind)> = self
            .tags
            .keys()
            .filter_map(|&id| match policy_for(id).role() {
                TagRole::SubIfd(kind) => Some((id, kind)),
                _ => None,
            })
            .collect();

        for (id, kind) in pointers {
            self.resolve_sub_ifds(id, kind)?;
        }
        Ok(())
    }

    /// Slots of a pointer tag already converted by resolution.
    pub fn sub_ifd_refs(&self, id: TagId) -> Option<&[IfdRef]> {
        match self.tags.get(&id) {
            Some(Tag::Memory(memory)) => match memory.payload() {
                Payload::SubIfds { refs, .. } => Some(refs),
                _ => None,
            },
            _ => None,
        }
    }

    /// Resolved directories `id` points to.
    pub fn sub_ifds(&self, id: TagId) -> Vec<&TiffIfd> {
        self.sub_ifd_refs(id)
            .map(|refs| refs.iter().filter_map(IfdRef::resolved).collect())
            .unwrap_or_default()
    }

    /// Every resolved child directory, in tag order.
    pub fn children(&self) -> impl Iterator<Item = &TiffIfd> {
        self.tags
            .values()
            .filter_map(|tag| match tag {
                Tag::Memory(memory) => match memory.payload() {
                    Payload::SubIfds { refs, .. } => Some(refs),
                    _ => None,
                },
                Tag::Disk(_) => None,
            })
            .flat_map(|refs| refs.iter().filter_map(IfdRef::resolved))
    }

    fn children_mut(&mut self) -> impl Iterator<Item = &mut TiffIfd> {
        self.tags
            .values_mut()
            .filter_map(|tag| match tag {
                Tag::Memory(memory) => match memory.payload_mut() {
                    Payload::SubIfds { refs, .. } => Some(refs),
                    _ => None,
                },
                Tag::Disk(_) => None,
            })
            .flat_map(|refs| refs.iter_mut().filter_map(IfdRef::resolved_mut))
    }

    // -------------------------------------------------------------------------
    // Repair
    // -------------------------------------------------------------------------

    /// Normalize legacy or incomplete tags before saving.
    ///
    /// Image directories:
    /// - SubfileType 1/2/3 becomes NewSubfileType 0/1/2
    /// - a missing PhotometricInterpretation is derived from SamplesPerPixel
    /// - a missing ImageLength is derived from uncompressed strip data
    /// - missing StripByteCounts for a single uncompressed strip are computed
    ///
    /// Other directory kinds have no rules. Resolved children are repaired too.
    pub fn repair(&mut self) -> Result<()> {
        if self.kind == IfdKind::Image {
            self.repair_subfile_type()?;
            self.repair_photometric()?;
            self.repair_strip_geometry()?;
        }
        for child in self.children_mut() {
            child.repair()?;
        }
        Ok(())
    }

    fn repair_subfile_type(&mut self) -> Result<()> {
        let Some(old) = self.tag_u64(TagId::SUBFILE_TYPE)? else {
            return Ok(());
        };
        if !self.contains(TagId::NEW_SUBFILE_TYPE) {
            let flags = match old {
                2 => 1,
                3 => 2,
                _ => 0,
            };
            debug!(old, flags, "Replacing SubfileType with NewSubfileType");
            self.set(TagId::NEW_SUBFILE_TYPE, Value::Long(vec![flags]));
        }
        self.remove(TagId::SUBFILE_TYPE);
        Ok(())
    }

    fn repair_photometric(&mut self) -> Result<()> {
        if self.contains(TagId::PHOTOMETRIC_INTERPRETATION) {
            return Ok(());
        }
        let spp = self.image_params()?.samples_per_pixel;
        let photometric = if spp >= 3 { 2 } else { 1 };
        debug!(spp, photometric, "Deriving missing PhotometricInterpretation");
        self.set(
            TagId::PHOTOMETRIC_INTERPRETATION,
            Value::Short(vec![photometric]),
        );
        Ok(())
    }

    fn repair_strip_geometry(&mut self) -> Result<()> {
        let params = self.image_params()?;
        if params.is_tiled() || params.compression != 1 || params.is_planar() {
            return Ok(());
        }
        let Some(strip_count) = self.get(TagId::STRIP_OFFSETS).map(Tag::count) else {
            return Ok(());
        };
        let row_bytes = match params.bits_per_pixel().checked_mul(params.width) {
            Some(bits) if bits > 0 => bits.div_ceil(8),
            _ => return Ok(()),
        };

        if !self.contains(TagId::IMAGE_LENGTH) {
            if let Some(counts) = self.get(TagId::STRIP_BYTE_COUNTS) {
                let total = counts
                    .as_u64s()?
                    .iter()
                    .fold(0u64, |sum, &c| sum.saturating_add(c));
                let height = total / row_bytes;
                if let Some(value) = Value::from_u64s(DataType::Long, &[height]) {
                    debug!(height, "Deriving missing ImageLength from strip data");
                    self.set(TagId::IMAGE_LENGTH, value);
                }
            }
        }

        if !self.contains(TagId::STRIP_BYTE_COUNTS) && strip_count == 1 {
            let height = self.tag_u64(TagId::IMAGE_LENGTH)?.unwrap_or(0);
            if let Some(size) = row_bytes.checked_mul(height).filter(|&size| size > 0) {
                debug!(size, "Synthesizing StripByteCounts for a single strip");
                self.set(TagId::STRIP_BYTE_COUNTS, counts_value(&[size]));
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Materialization
    // -------------------------------------------------------------------------

    /// Replace every disk tag with an in-memory tag.
    ///
    /// Sub-IFDs are resolved and loaded recursively; strip and tile offsets
    /// are bound to the data they point at. Calling this again is a no-op.
    pub fn load_into_memory(&mut self) -> Result<()> {
        if self.in_memory {
            for child in self.children_mut() {
                child.load_into_memory()?;
            }
            return Ok(());
        }

        self.resolve_all_sub_ifds()?;
        for child in self.children_mut() {
            child.load_into_memory()?;
        }

        let mut loaded = BTreeMap::new();
        for (&id, tag) in &self.tags {
            let memory = match (tag, policy_for(id).role()) {
                (Tag::Disk(_), TagRole::ChunkOffsets { counts, .. }) => {
                    MemoryTag::new(id, Payload::Chunks(self.disk_chunks(tag, counts)?))
                }
                _ => tag.to_memory()?,
            };
            loaded.insert(id, Tag::Memory(memory));
        }
        self.tags = loaded;
        self.in_memory = true;

        debug!(offset = ?self.offset, entries = self.tags.len(), "Loaded IFD into memory");
        Ok(())
    }

    fn disk_chunks(&self, offsets_tag: &Tag, counts_id: TagId) -> Result<Vec<ChunkRef>> {
        let id = offsets_tag.id();
        let offsets = offsets_tag.as_u64s()?;
        let counts = self
            .get(counts_id)
            .ok_or(TiffError::MissingField(counts_id))?
            .as_u64s()?;
        if offsets.len() != counts.len() {
            return Err(TiffError::InvalidTagValue {
                tag: id,
                message: format!(
                    "{} offsets but {} byte counts",
                    offsets.len(),
                    counts.len()
                ),
            });
        }
        let reader = self.source.as_ref().ok_or_else(|| TiffError::InvalidTagValue {
            tag: id,
            message: "no source file to read chunks from".to_string(),
        })?;

        offsets
            .into_iter()
            .zip(counts)
            .map(|(offset, len)| {
                check_extent(reader, offset, len)?;
                Ok(ChunkRef::File {
                    reader: Arc::clone(reader),
                    offset,
                    len,
                })
            })
            .collect()
    }

    /// The offsets tag carrying image data and its chunks, if any.
    ///
    /// Tiles take precedence over strips. Requires the directory to be
    /// loaded into memory.
    pub fn chunks(&self) -> Result<Option<(TagId, &[ChunkRef])>> {
        for id in [TagId::TILE_OFFSETS, TagId::STRIP_OFFSETS] {
            let Some(tag) = self.tags.get(&id) else {
                continue;
            };
            let not_bound = |message: &str| TiffError::InvalidTagValue {
                tag: id,
                message: message.to_string(),
            };
            return match tag {
                Tag::Memory(memory) => match memory.payload() {
                    Payload::Chunks(chunks) => Ok(Some((id, chunks))),
                    _ => Err(not_bound("offsets are not bound to chunk data")),
                },
                Tag::Disk(_) => Err(not_bound("directory is not loaded into memory")),
            };
        }
        Ok(None)
    }

    // -------------------------------------------------------------------------
    // Byte swapping
    // -------------------------------------------------------------------------

    /// Reverse the byte order of `height` rows of `width` packed samples.
    ///
    /// Bytes past the last whole sample are copied unchanged.
    ///
    /// # Errors
    /// `Unimplemented` for depths other than 16, 24, 32 and 64 bits.
    pub fn byte_swap(
        data: &[u8],
        width: u64,
        height: u64,
        bits_per_component: u16,
    ) -> Result<Vec<u8>> {
        let sample_len = match bits_per_component {
            16 => 2,
            24 => 3,
            32 => 4,
            64 => 8,
            other => {
                return Err(TiffError::Unimplemented(format!(
                    "byte swap of {other}-bit samples"
                )))
            }
        };

        let samples = width
            .saturating_mul(height)
            .min((data.len() / sample_len) as u64) as usize;
        let mut out = data.to_vec();
        for sample in out[..samples * sample_len].chunks_exact_mut(sample_len) {
            sample.reverse();
        }
        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Building
    // -------------------------------------------------------------------------

    /// Insert or replace a tag with an in-memory value.
    pub fn set(&mut self, id: TagId, value: Value) -> Option<Tag> {
        self.tags
            .insert(id, Tag::Memory(MemoryTag::from_value(id, value)))
    }

    pub fn remove(&mut self, id: TagId) -> Option<Tag> {
        self.tags.remove(&id)
    }

    /// Point `id` at in-memory child directories.
    pub fn set_sub_ifds(&mut self, id: TagId, children: Vec<TiffIfd>) {
        let depth = self.depth + 1;
        let refs = children
            .into_iter()
            .map(|mut child| {
                child.depth = depth;
                IfdRef::Resolved(Box::new(child))
            })
            .collect();
        let data_type = if id == TagId::SUB_IFDS {
            DataType::Ifd
        } else {
            DataType::Long
        };
        self.tags.insert(
            id,
            Tag::Memory(MemoryTag::new(id, Payload::SubIfds { data_type, refs })),
        );
    }

    /// Attach strip data, replacing any strips or tiles.
    pub fn set_strips(&mut self, rows_per_strip: u32, strips: Vec<Bytes>) {
        for id in [TagId::TILE_WIDTH, TagId::TILE_LENGTH, TagId::TILE_OFFSETS, TagId::TILE_BYTE_COUNTS] {
            self.tags.remove(&id);
        }
        self.set(TagId::ROWS_PER_STRIP, Value::Long(vec![rows_per_strip]));
        self.set_chunks(TagId::STRIP_OFFSETS, TagId::STRIP_BYTE_COUNTS, strips);
    }

    /// Attach tile data, replacing any strips or tiles.
    pub fn set_tiles(&mut self, tile_width: u32, tile_height: u32, tiles: Vec<Bytes>) {
        for id in [TagId::ROWS_PER_STRIP, TagId::STRIP_OFFSETS, TagId::STRIP_BYTE_COUNTS] {
            self.tags.remove(&id);
        }
        self.set(TagId::TILE_WIDTH, Value::Long(vec![tile_width]));
        self.set(TagId::TILE_LENGTH, Value::Long(vec![tile_height]));
        self.set_chunks(TagId::TILE_OFFSETS, TagId::TILE_BYTE_COUNTS, tiles);
    }

    fn set_chunks(&mut self, offsets: TagId, counts: TagId, data: Vec<Bytes>) {
        let lens: Vec<u64> = data.iter().map(|d| d.len() as u64).collect();
        self.set(counts, counts_value(&lens));
        self.tags.insert(
            offsets,
            Tag::Memory(MemoryTag::new(
                offsets,
                Payload::Chunks(data.into_iter().map(ChunkRef::Memory).collect()),
            )),
        );
    }
}

fn offsets_to_refs(id: TagId, value: &Value) -> Result<Vec<IfdRef>> {
    value
        .to_u64s()
        .map(|offsets| offsets.into_iter().map(IfdRef::Unresolved).collect())
        .ok_or_else(|| TiffError::WrongType {
            tag: id,
            found: value.data_type().to_string(),
        })
}

fn counts_value(lens: &[u64]) -> Value {
    Value::from_u64s(DataType::Long, lens).unwrap_or_else(|| Value::Long8(lens.to_vec()))
}

// =============================================================================
// Tests
// =============================================================================
