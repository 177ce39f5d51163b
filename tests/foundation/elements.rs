//! Integration tests for element types and identifiers

use datagraph_foundation::{Element, ElementType, EntityId, slices_bits_eq};

#[test]
fn names_round_trip() {
    for ty in ElementType::ALL {
        assert_eq!(ElementType::from_name(ty.name()), Some(ty));
    }
}

#[test]
fn c_style_aliases() {
    assert_eq!(ElementType::from_name("double"), Some(ElementType::Float64));
    assert_eq!(ElementType::from_name("int32_t"), Some(ElementType::Int32));
    assert_eq!(ElementType::from_name("complex"), None);
}

#[test]
fn sizes() {
    assert_eq!(ElementType::Bool.size(), 1);
    assert_eq!(ElementType::UInt16.size(), 2);
    assert_eq!(ElementType::Float32.size(), 4);
    assert_eq!(ElementType::Int64.size(), 8);
}

#[test]
fn encoding_is_little_endian() {
    let mut out = Vec::new();
    u32::encode(&[1, 0x0102_0304], &mut out);
    assert_eq!(out, vec![1, 0, 0, 0, 4, 3, 2, 1]);
    assert_eq!(u32::decode(&out).unwrap(), vec![1, 0x0102_0304]);
}

#[test]
fn decode_rejects_ragged_buffers() {
    assert!(i16::decode(&[1, 2, 3]).is_err());
}

#[test]
fn float_equality_is_bitwise() {
    let nan = f32::NAN;
    assert!(slices_bits_eq(&[nan, 1.0], &[nan, 1.0]));
    assert!(!slices_bits_eq(&[0.0f64], &[-0.0f64]));
}

#[test]
fn entity_ids() {
    assert!(EntityId::ROOT.is_root());
    assert_eq!(EntityId::ROOT.next(), EntityId::FIRST);
    assert_eq!(EntityId::new(7).raw(), 7);
    assert_eq!(EntityId::new(7).to_string(), "#7");
}
