//! Save/re-parse integration tests.
//!
//! Tests verify:
//! - The 2x2 grayscale image survives a classic little-endian rewrite
//! - Every combination of byte order and flavor preserves tag values
//! - Rewriting a rewritten file is byte-identical
//! - Directory chains and EXIF children are rebuilt

use bytes::Bytes;

use tiff_ifd::{
    save_tiff, ByteOrder, CodecRegistry, DataType, IfdKind, TagId, TiffIfd, Value, WriteOptions,
};

use super::test_utils::{first_ifd, gray_2x2, open, strip_bytes, TiffBuilder};

const FLAVORS: [(ByteOrder, bool); 4] = [
    (ByteOrder::LittleEndian, false),
    (ByteOrder::BigEndian, false),
    (ByteOrder::LittleEndian, true),
    (ByteOrder::BigEndian, true),
];

// =============================================================================
// End-to-end grayscale image
// =============================================================================

#[test]
fn test_gray_2x2_end_to_end() {
    let mut ifd = TiffIfd::new(IfdKind::Image, ByteOrder::LittleEndian, false);
    ifd.set(TagId::IMAGE_WIDTH, Value::Short(vec![2]));
    ifd.set(TagId::IMAGE_LENGTH, Value::Short(vec![2]));
    ifd.set(TagId::BITS_PER_SAMPLE, Value::Short(vec![8]));
    ifd.set(TagId::COMPRESSION, Value::Short(vec![1]));
    ifd.set(TagId::PHOTOMETRIC_INTERPRETATION, Value::Short(vec![1]));
    ifd.set_strips(2, vec![Bytes::from_static(&[0, 64, 128, 255])]);

    let file = ifd.save(Vec::new(), &WriteOptions::default()).unwrap();
    assert_eq!(&file[..4], b"II*\0");

    let back = first_ifd(file.clone());
    assert_eq!(back.get_u64(TagId::IMAGE_WIDTH).unwrap(), 2);
    assert_eq!(back.get_u64(TagId::IMAGE_LENGTH).unwrap(), 2);
    assert_eq!(back.get_u64s(TagId::BITS_PER_SAMPLE).unwrap(), vec![8]);
    assert_eq!(back.get_u64(TagId::COMPRESSION).unwrap(), 1);
    assert_eq!(back.get_u64s(TagId::STRIP_BYTE_COUNTS).unwrap(), vec![4]);
    assert_eq!(strip_bytes(&file, &back), vec![vec![0, 64, 128, 255]]);
}

#[test]
fn test_parsed_file_rewrites_in_every_flavor() {
    for (order, big) in FLAVORS {
        let source = gray_2x2(ByteOrder::BigEndian, false);
        let mut ifd = first_ifd(source);
        let file = ifd.save(Vec::new(), &WriteOptions::new(order, big)).unwrap();

        let doc = open(file.clone());
        assert_eq!(doc.header().byte_order, order);
        assert_eq!(doc.header().is_bigtiff, big);

        let back = doc.first_ifd().unwrap();
        assert_eq!(back.get_u64(TagId::IMAGE_WIDTH).unwrap(), 2);
        assert_eq!(back.get_u64(TagId::ROWS_PER_STRIP).unwrap(), 2);
        assert_eq!(strip_bytes(&file, &back), vec![vec![10, 20, 30, 40]]);
    }
}

#[test]
fn test_values_survive_every_flavor() {
    for (order, big) in FLAVORS {
        let mut ifd = first_ifd(gray_2x2(ByteOrder::LittleEndian, false));
        ifd.set(TagId::SOFTWARE, Value::ascii("tiff-ifd test suite"));
        ifd.set(TagId::X_RESOLUTION, Value::rationals(&[72.5]).unwrap());
        ifd.set(TagId(65001), Value::Double(vec![1.5, -2.25]));
        ifd.set(TagId(65002), Value::SShort(vec![-7, 7]));
        ifd.set(TagId(65003), Value::Undefined(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]));

        let file = ifd.save(Vec::new(), &WriteOptions::new(order, big)).unwrap();
        let back = first_ifd(file);

        assert_eq!(
            back.get(TagId::SOFTWARE).unwrap().as_str().unwrap(),
            "tiff-ifd test suite"
        );
        assert_eq!(back.get(TagId::X_RESOLUTION).unwrap().as_f64s().unwrap(), vec![72.5]);
        assert_eq!(
            back.get(TagId(65001)).unwrap().value().unwrap().as_ref(),
            &Value::Double(vec![1.5, -2.25])
        );
        assert_eq!(
            back.get(TagId(65002)).unwrap().value().unwrap().as_ref(),
            &Value::SShort(vec![-7, 7])
        );
        assert_eq!(
            back.get(TagId(65003)).unwrap().value().unwrap().as_bytes(),
            Some(&[1, 2, 3, 4, 5, 6, 7, 8, 9][..])
        );
    }
}

#[test]
fn test_rewrite_is_stable() {
    for (order, big) in FLAVORS {
        let options = WriteOptions::new(order, big);
        let once = first_ifd(gray_2x2(ByteOrder::LittleEndian, false))
            .save(Vec::new(), &options)
            .unwrap();
        let twice = first_ifd(once.clone()).save(Vec::new(), &options).unwrap();
        assert_eq!(once, twice);
    }
}

// =============================================================================
// Chains and children
// =============================================================================

#[test]
fn test_directory_chain() {
    let mut ifds = vec![
        first_ifd(gray_2x2(ByteOrder::LittleEndian, false)),
        first_ifd(gray_2x2(ByteOrder::BigEndian, true)),
    ];
    ifds[1].set(TagId::NEW_SUBFILE_TYPE, Value::Long(vec![1]));

    let file = save_tiff(
        &mut ifds,
        &WriteOptions::default(),
        &CodecRegistry::default(),
        Vec::new(),
    )
    .unwrap();

    let parsed = open(file.clone()).ifds().unwrap();
    assert_eq!(parsed.len(), 2);
    assert!(!parsed[0].contains(TagId::NEW_SUBFILE_TYPE));
    assert_eq!(parsed[1].get_u64(TagId::NEW_SUBFILE_TYPE).unwrap(), 1);
    assert_eq!(parsed[1].next_ifd_offset(), 0);
    for ifd in &parsed {
        assert_eq!(strip_bytes(&file, ifd), vec![vec![10, 20, 30, 40]]);
    }
}

#[test]
fn test_exif_child_survives_flavor_change() {
    let mut ifd = first_ifd(gray_2x2(ByteOrder::LittleEndian, false));
    let mut exif = TiffIfd::new(IfdKind::Exif, ByteOrder::LittleEndian, false);
    exif.set(TagId::COLOR_SPACE, Value::Short(vec![1]));
    exif.set(TagId::DATE_TIME_ORIGINAL, Value::ascii("2024:01:01 12:00:00"));
    ifd.set_sub_ifds(TagId::EXIF_IFD, vec![exif]);

    let big = ifd
        .save(Vec::new(), &WriteOptions::new(ByteOrder::BigEndian, true))
        .unwrap();
    let mut parsed = first_ifd(big);
    assert_eq!(parsed.get(TagId::EXIF_IFD).unwrap().data_type(), DataType::Long8);

    let classic = parsed.save(Vec::new(), &WriteOptions::default()).unwrap();
    let mut back = first_ifd(classic);
    assert_eq!(back.get(TagId::EXIF_IFD).unwrap().data_type(), DataType::Long);

    back.resolve_all_sub_ifds().unwrap();
    let children = back.sub_ifds(TagId::EXIF_IFD);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].kind(), IfdKind::Exif);
    assert_eq!(
        children[0].get(TagId::DATE_TIME_ORIGINAL).unwrap().as_str().unwrap(),
        "2024:01:01 12:00:00"
    );
}

#[test]
fn test_free_offsets_are_not_written() {
    let source = TiffBuilder::new(ByteOrder::LittleEndian, false)
        .short(256, &[2])
        .short(257, &[2])
        .short(258, &[8])
        .long(288, &[0])
        .long(289, &[0])
        .strips(vec![vec![1, 2, 3, 4]])
        .build();
    let mut ifd = first_ifd(source);
    assert!(ifd.contains(TagId::FREE_OFFSETS));

    let back = first_ifd(ifd.save(Vec::new(), &WriteOptions::default()).unwrap());
    assert!(!back.contains(TagId::FREE_OFFSETS));
    assert!(!back.contains(TagId::FREE_BYTE_COUNTS));
}
