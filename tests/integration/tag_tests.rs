//! Tag resolution integration tests.
//!
//! Tests verify:
//! - Absent tags take their policy default, or fail with MissingField
//! - Values stored in a narrower or different type are widened
//! - Unknown field types are skipped unless the entry is structural
//! - Zero-count entries take their count from the policy
//! - Repair normalizes legacy and incomplete directories
//! - Sub-IFD pointers that loop back are rejected

use tiff_ifd::{ByteOrder, IfdKind, TagId, TiffError, Value, WriteOptions};

use super::test_utils::{enc_u16, first_ifd, gray_2x2, open, TiffBuilder, BYTE, DOUBLE, SHORT};

// =============================================================================
// Defaults and widening
// =============================================================================

#[test]
fn test_defaults_for_absent_tags() {
    let ifd = first_ifd(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .short(256, &[4])
            .short(277, &[3])
            .build(),
    );

    assert_eq!(
        ifd.get_required(TagId::BITS_PER_SAMPLE).unwrap().as_ref(),
        &Value::Short(vec![1, 1, 1])
    );
    assert_eq!(ifd.get_u64(TagId::COMPRESSION).unwrap(), 1);
    assert_eq!(ifd.get_u64(TagId::RESOLUTION_UNIT).unwrap(), 2);
    assert!(matches!(
        ifd.get_required(TagId::IMAGE_LENGTH),
        Err(TiffError::MissingField(TagId::IMAGE_LENGTH))
    ));
    assert_eq!(
        ifd.get_optional(TagId::IMAGE_LENGTH, Value::Long(vec![9]))
            .unwrap()
            .as_ref(),
        &Value::Long(vec![9])
    );
}

#[test]
fn test_values_are_widened() {
    let ifd = first_ifd(
        TiffBuilder::new(ByteOrder::BigEndian, false)
            .raw(256, BYTE, 1, vec![200])
            .long(274, &[3])
            .build(),
    );

    // BYTE widens to the numeric accessors
    assert_eq!(ifd.get_u64(TagId::IMAGE_WIDTH).unwrap(), 200);
    // LONG narrows into the only accepted type when every element fits
    assert_eq!(
        ifd.get_required(TagId::ORIENTATION).unwrap().as_ref(),
        &Value::Short(vec![3])
    );
}

#[test]
fn test_wrong_type_is_reported() {
    let ifd = first_ifd(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .ascii(259, "LZW")
            .build(),
    );
    assert!(matches!(
        ifd.get_required(TagId::COMPRESSION),
        Err(TiffError::WrongType { tag: TagId::COMPRESSION, .. })
    ));
}

#[test]
fn test_rational_resolution() {
    let ifd = first_ifd(
        TiffBuilder::new(ByteOrder::BigEndian, false)
            .rational(282, 300, 2)
            .build(),
    );
    let tag = ifd.get(TagId::X_RESOLUTION).unwrap();
    assert_eq!(tag.value().unwrap().as_rationals(), Some(&[(300, 2)][..]));
    assert_eq!(tag.as_f64s().unwrap(), vec![150.0]);
}

#[test]
fn test_double_tag_reads_as_floats() {
    let payload = 0.25f64.to_le_bytes().to_vec();
    let ifd = first_ifd(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .raw(65010, DOUBLE, 1, payload)
            .build(),
    );
    assert_eq!(ifd.get(TagId(65010)).unwrap().as_f64s().unwrap(), vec![0.25]);
}

// =============================================================================
// Entry parsing
// =============================================================================

#[test]
fn test_unknown_type_is_skipped() {
    let ifd = first_ifd(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .short(256, &[2])
            .raw(65020, 99, 1, vec![1, 2, 3, 4])
            .build(),
    );
    assert!(ifd.contains(TagId::IMAGE_WIDTH));
    assert!(!ifd.contains(TagId(65020)));
    assert_eq!(ifd.len(), 1);
}

#[test]
fn test_unknown_type_on_structural_tag_fails() {
    let doc = open(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .short(256, &[2])
            .raw(273, 99, 1, vec![0, 1, 0, 0])
            .build(),
    );
    assert!(matches!(doc.first_ifd(), Err(TiffError::UnknownFieldType(99))));
}

#[test]
fn test_zero_count_takes_policy_count() {
    let order = ByteOrder::LittleEndian;
    let bits: Vec<u8> = [8u16, 8, 8].iter().flat_map(|&b| enc_u16(order, b)).collect();
    let ifd = first_ifd(
        TiffBuilder::new(order, false)
            .short(256, &[1])
            .raw(258, SHORT, 0, bits)
            .short(277, &[3])
            .build(),
    );
    assert_eq!(ifd.get_u64s(TagId::BITS_PER_SAMPLE).unwrap(), vec![8, 8, 8]);
}

// =============================================================================
// Repair
// =============================================================================

#[test]
fn test_repair_normalizes_legacy_tags() {
    let mut ifd = first_ifd(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .short(255, &[2])
            .short(256, &[2])
            .short(258, &[8, 8, 8])
            .short(277, &[3])
            .strips(vec![vec![0; 18]])
            .build(),
    );
    ifd.repair().unwrap();

    assert!(!ifd.contains(TagId::SUBFILE_TYPE));
    assert_eq!(ifd.get_u64(TagId::NEW_SUBFILE_TYPE).unwrap(), 1);
    assert_eq!(ifd.get_u64(TagId::PHOTOMETRIC_INTERPRETATION).unwrap(), 2);
    assert_eq!(ifd.get_u64(TagId::IMAGE_LENGTH).unwrap(), 3);

    let back = first_ifd(ifd.save(Vec::new(), &WriteOptions::default()).unwrap());
    assert_eq!(back.get_u64(TagId::IMAGE_LENGTH).unwrap(), 3);
    assert_eq!(back.get_u64(TagId::NEW_SUBFILE_TYPE).unwrap(), 1);
}

#[test]
fn test_repair_keeps_complete_directory() {
    let mut ifd = first_ifd(gray_2x2(ByteOrder::LittleEndian, false));
    let before = ifd.len();
    ifd.repair().unwrap();
    assert_eq!(ifd.len(), before);
    assert_eq!(ifd.get_u64(TagId::PHOTOMETRIC_INTERPRETATION).unwrap(), 1);
}

// =============================================================================
// Sub-IFDs
// =============================================================================

#[test]
fn test_self_referencing_sub_ifd_is_rejected() {
    let mut ifd = first_ifd(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .short(256, &[2])
            .long(34665, &[8])
            .build(),
    );
    assert!(matches!(
        ifd.resolve_sub_ifds(TagId::EXIF_IFD, IfdKind::Exif),
        Err(TiffError::InvalidIfdOffset(8))
    ));
    assert!(ifd.contains(TagId::EXIF_IFD));
}

#[test]
fn test_out_of_range_sub_ifd_is_an_error() {
    let mut ifd = first_ifd(
        TiffBuilder::new(ByteOrder::LittleEndian, false)
            .short(256, &[2])
            .long(34665, &[1_000_000])
            .build(),
    );
    assert!(ifd.resolve_all_sub_ifds().is_err());
}
