//! Layout integration tests.
//!
//! Tests verify:
//! - Values up to 4 (classic) or 8 (BigTIFF) bytes are stored inline
//! - Offsets and byte-count arrays land after the image data
//! - 16-bit samples are byte swapped when the byte order changes
//! - Planar bottom strips are padded to full height when swapped
//! - Tiled images are rebuilt from their tiles

use bytes::Bytes;

use tiff_ifd::{
    ByteOrder, DataType, IfdKind, IoError, Tag, TagId, TagState, TiffError, TiffIfd, Value,
    WriteOptions,
};

use super::test_utils::{enc_u64, first_ifd, gray16, gray_2x2, strip_bytes, TiffBuilder, LONG8};

fn state(ifd: &TiffIfd, id: TagId) -> TagState {
    match ifd.get(id) {
        Some(Tag::Disk(disk)) => disk.state(),
        other => panic!("expected a disk tag for {id}, got {other:?}"),
    }
}

// =============================================================================
// Inline thresholds
// =============================================================================

#[test]
fn test_classic_inline_threshold_is_four_bytes() {
    let mut ifd = first_ifd(gray_2x2(ByteOrder::LittleEndian, false));
    ifd.set(TagId::ARTIST, Value::ascii("abc"));
    ifd.set(TagId::SOFTWARE, Value::ascii("abcd"));

    let back = first_ifd(ifd.save(Vec::new(), &WriteOptions::default()).unwrap());
    back.get(TagId::ARTIST).unwrap().value().unwrap();
    back.get(TagId::SOFTWARE).unwrap().value().unwrap();
    assert_eq!(state(&back, TagId::ARTIST), TagState::Inline);
    assert_eq!(state(&back, TagId::SOFTWARE), TagState::OnDisk);
}

#[test]
fn test_bigtiff_inline_threshold_is_eight_bytes() {
    let mut ifd = first_ifd(gray_2x2(ByteOrder::BigEndian, false));
    ifd.set(TagId::ARTIST, Value::ascii("abcdefg"));
    ifd.set(TagId::SOFTWARE, Value::ascii("abcdefgh"));
    ifd.set(TagId::X_RESOLUTION, Value::Rational(vec![(300, 1)]));

    let options = WriteOptions::new(ByteOrder::BigEndian, true);
    let back = first_ifd(ifd.save(Vec::new(), &options).unwrap());
    for id in [TagId::ARTIST, TagId::SOFTWARE, TagId::X_RESOLUTION] {
        back.get(id).unwrap().value().unwrap();
    }
    assert_eq!(state(&back, TagId::ARTIST), TagState::Inline);
    assert_eq!(state(&back, TagId::X_RESOLUTION), TagState::Inline);
    assert_eq!(state(&back, TagId::SOFTWARE), TagState::OnDisk);
    assert_eq!(back.get(TagId::X_RESOLUTION).unwrap().as_f64s().unwrap(), vec![300.0]);
}

#[test]
fn test_tags_are_lazy_until_read() {
    let ifd = first_ifd(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .short(256, &[2])
            .ascii(270, "a longer description")
            .build(),
    );
    assert_eq!(state(&ifd, TagId::IMAGE_DESCRIPTION), TagState::Unresolved);
    assert_eq!(
        ifd.get(TagId::IMAGE_DESCRIPTION).unwrap().as_str().unwrap(),
        "a longer description"
    );
    assert_eq!(state(&ifd, TagId::IMAGE_DESCRIPTION), TagState::OnDisk);
}

// =============================================================================
// Array placement
// =============================================================================

#[test]
fn test_arrays_follow_image_data() {
    let source = gray16(ByteOrder::LittleEndian, 3, 5, 1);
    let mut ifd = first_ifd(source);
    let file = ifd.save(Vec::new(), &WriteOptions::default()).unwrap();
    let back = first_ifd(file.clone());

    let offsets = back.get_u64s(TagId::STRIP_OFFSETS).unwrap();
    let counts = back.get_u64s(TagId::STRIP_BYTE_COUNTS).unwrap();
    assert_eq!(counts, vec![6; 5]);
    assert!(offsets.iter().all(|o| o % 2 == 0));
    assert_eq!(back.get(TagId::STRIP_OFFSETS).unwrap().data_type(), DataType::Short);

    let data_end = offsets[4] + counts[4];
    for id in [TagId::STRIP_OFFSETS, TagId::STRIP_BYTE_COUNTS] {
        let Some(Tag::Disk(disk)) = back.get(id) else {
            panic!("expected disk tag");
        };
        let at = disk.payload_offset().unwrap();
        assert!(at >= data_end, "{id} array at {at} precedes data end {data_end}");
        assert_eq!(at % 2, 0);
    }
    assert_eq!(file.len() as u64, data_end + 10 + 10);
}

#[test]
fn test_tiled_image_rebuilt_from_tiles() {
    let mut ifd = TiffIfd::new(IfdKind::Image, ByteOrder::LittleEndian, false);
    ifd.set(TagId::IMAGE_WIDTH, Value::Long(vec![32]));
    ifd.set(TagId::IMAGE_LENGTH, Value::Long(vec![16]));
    ifd.set(TagId::BITS_PER_SAMPLE, Value::Short(vec![8]));
    ifd.set(TagId::COMPRESSION, Value::Short(vec![1]));
    ifd.set(TagId::PHOTOMETRIC_INTERPRETATION, Value::Short(vec![1]));
    let tiles = vec![Bytes::from(vec![1u8; 256]), Bytes::from(vec![2u8; 256])];
    ifd.set_tiles(16, 16, tiles);

    let file = ifd.save(Vec::new(), &WriteOptions::default()).unwrap();
    let back = first_ifd(file.clone());
    assert!(!back.contains(TagId::STRIP_OFFSETS));
    assert_eq!(back.get_u64(TagId::TILE_WIDTH).unwrap(), 16);

    let offsets = back.get_u64s(TagId::TILE_OFFSETS).unwrap();
    let counts = back.get_u64s(TagId::TILE_BYTE_COUNTS).unwrap();
    assert_eq!(counts, vec![256, 256]);
    assert_eq!(file[offsets[0] as usize], 1);
    assert_eq!(file[offsets[1] as usize + 255], 2);
}

// =============================================================================
// Byte swapping
// =============================================================================

#[test]
fn test_cross_endian_16_bit_swap() {
    let source = gray16(ByteOrder::BigEndian, 2, 2, 2);
    let mut ifd = first_ifd(source.clone());
    let original = strip_bytes(&source, &ifd);

    let file = ifd
        .save(Vec::new(), &WriteOptions::new(ByteOrder::LittleEndian, false))
        .unwrap();
    let back = first_ifd(file.clone());
    let swapped = strip_bytes(&file, &back);

    assert_eq!(original, vec![vec![0, 1, 2, 3, 4, 5, 6, 7]]);
    assert_eq!(swapped, vec![vec![1, 0, 3, 2, 5, 4, 7, 6]]);
}

#[test]
fn test_same_order_does_not_swap() {
    let source = gray16(ByteOrder::BigEndian, 2, 2, 2);
    let mut ifd = first_ifd(source.clone());
    let file = ifd
        .save(Vec::new(), &WriteOptions::new(ByteOrder::BigEndian, true))
        .unwrap();
    let back = first_ifd(file.clone());
    assert_eq!(strip_bytes(&file, &back), strip_bytes(&source, &ifd));
}

#[test]
fn test_planar_bottom_strips_are_padded() {
    // Two planes of 16-bit samples, 3 rows in strips of 2: the last strip of
    // each plane holds one row in the source
    let order = ByteOrder::LittleEndian;
    let plane = |seed: u8| {
        vec![
            Bytes::from(vec![seed; 8]),
            Bytes::from(vec![seed + 1; 4]),
        ]
    };
    let mut ifd = TiffIfd::new(IfdKind::Image, order, false);
    ifd.set(TagId::IMAGE_WIDTH, Value::Short(vec![2]));
    ifd.set(TagId::IMAGE_LENGTH, Value::Short(vec![3]));
    ifd.set(TagId::BITS_PER_SAMPLE, Value::Short(vec![16, 16]));
    ifd.set(TagId::SAMPLES_PER_PIXEL, Value::Short(vec![2]));
    ifd.set(TagId::PLANAR_CONFIGURATION, Value::Short(vec![2]));
    ifd.set(TagId::COMPRESSION, Value::Short(vec![1]));
    ifd.set(TagId::PHOTOMETRIC_INTERPRETATION, Value::Short(vec![1]));
    ifd.set_strips(2, plane(10).into_iter().chain(plane(20)).collect());

    let file = ifd
        .save(Vec::new(), &WriteOptions::new(ByteOrder::BigEndian, false))
        .unwrap();
    let back = first_ifd(file.clone());
    assert_eq!(back.get_u64s(TagId::STRIP_BYTE_COUNTS).unwrap(), vec![8; 4]);

    let strips = strip_bytes(&file, &back);
    assert_eq!(strips[1], vec![11, 11, 11, 11, 0, 0, 0, 0]);
    assert_eq!(strips[2], vec![20; 8]);
}

#[test]
fn test_subsampled_ycbcr_swap_is_unimplemented() {
    let mut ifd = TiffIfd::new(IfdKind::Image, ByteOrder::LittleEndian, false);
    ifd.set(TagId::IMAGE_WIDTH, Value::Short(vec![2]));
    ifd.set(TagId::IMAGE_LENGTH, Value::Short(vec![2]));
    ifd.set(TagId::BITS_PER_SAMPLE, Value::Short(vec![16, 16, 16]));
    ifd.set(TagId::SAMPLES_PER_PIXEL, Value::Short(vec![3]));
    ifd.set(TagId::COMPRESSION, Value::Short(vec![1]));
    ifd.set(TagId::PHOTOMETRIC_INTERPRETATION, Value::Short(vec![6]));
    ifd.set_strips(2, vec![Bytes::from(vec![0u8; 16])]);

    let result = ifd.save(Vec::new(), &WriteOptions::new(ByteOrder::BigEndian, false));
    assert!(matches!(result, Err(TiffError::Unimplemented(_))));
}

// =============================================================================
// Malformed sources
// =============================================================================

#[test]
fn test_strips_past_end_of_file_are_rejected() {
    let order = ByteOrder::LittleEndian;
    let long8s = |values: &[u64]| -> Vec<u8> {
        values.iter().flat_map(|&v| enc_u64(order, v)).collect()
    };
    let huge = 1u64 << 63;
    let source = TiffBuilder::new(order, true)
        .short(256, &[2])
        .short(257, &[2])
        .short(258, &[8])
        .raw(273, LONG8, 2, long8s(&[16, 16]))
        .raw(279, LONG8, 2, long8s(&[huge, huge]))
        .build();
    let mut ifd = first_ifd(source);

    let result = ifd.save(Vec::new(), &WriteOptions::new(order, true));
    assert!(matches!(
        result,
        Err(TiffError::Io(IoError::UnexpectedEndOfData { offset: 16, .. }))
    ));
}

#[test]
fn test_truncated_strip_is_rejected() {
    let order = ByteOrder::BigEndian;
    let source = TiffBuilder::new(order, false)
        .short(256, &[2])
        .short(257, &[2])
        .short(258, &[8])
        .long(273, &[8])
        .long(279, &[1_000])
        .build();
    let mut ifd = first_ifd(source);
    assert!(matches!(
        ifd.save(Vec::new(), &WriteOptions::default()),
        Err(TiffError::Io(IoError::UnexpectedEndOfData { requested: 1_000, .. }))
    ));
}
