//! Integration tests for Error types
//!
//! Tests error construction, display, categories, codes, and context.

use datagraph_foundation::{EntityId, Error, ErrorCategory, ErrorKind};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_name_collision() {
    let err = Error::name_collision(EntityId::ROOT, "Cells");
    assert!(matches!(err.kind, ErrorKind::NameCollision { ref name, .. } if name == "Cells"));
    let msg = format!("{err}");
    assert!(msg.contains("Cells"));
    assert!(msg.contains("<root>"));
}

#[test]
fn error_entity_not_found() {
    let err = Error::entity_not_found(EntityId::new(42));
    assert!(matches!(err.kind, ErrorKind::EntityNotFound(_)));
    assert!(format!("{err}").contains("#42"));
}

#[test]
fn error_shape_mismatch() {
    let err = Error::shape_mismatch(&[3, 4], &[4, 3]);
    assert!(matches!(
        err.kind,
        ErrorKind::ShapeMismatch { ref expected, ref actual } if expected == &[3, 4] && actual == &[4, 3]
    ));
}

#[test]
fn error_missing_metadata() {
    let err = Error::missing_metadata("/DataStructure/A", "ObjectId");
    let msg = format!("{err}");
    assert!(msg.contains("ObjectId"));
    assert!(msg.contains("/DataStructure/A"));
}

#[test]
fn error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: Error = io.into();
    assert_eq!(err.category(), ErrorCategory::Io);
}

// =============================================================================
// Categories and Codes
// =============================================================================

#[test]
fn categories_group_kinds() {
    assert_eq!(Error::cycle(EntityId::new(1), EntityId::new(2)).category(), ErrorCategory::Structural);
    assert_eq!(Error::out_of_range(5, 3).category(), ErrorCategory::Shape);
    assert_eq!(Error::unknown_type("Mystery").category(), ErrorCategory::Format);
    assert_eq!(Error::io("disk full").category(), ErrorCategory::Io);
}

#[test]
fn codes_are_stable_and_negative() {
    assert_eq!(Error::name_collision(EntityId::ROOT, "x").code(), -101);
    assert_eq!(Error::shape_mismatch(&[1], &[2]).code(), -201);
    assert_eq!(Error::unknown_type("x").code(), -301);
    assert_eq!(Error::io("x").code(), -401);
}

#[test]
fn codes_follow_category() {
    let errors = [
        Error::unknown_parent(EntityId::new(3)),
        Error::path_not_found("/a/b"),
        Error::type_mismatch("float32", "int8"),
        Error::invalid_format("truncated"),
        Error::io("denied"),
    ];
    for err in errors {
        let band = match err.category() {
            ErrorCategory::Structural => -199..=-100,
            ErrorCategory::Shape => -299..=-200,
            ErrorCategory::Format => -399..=-300,
            ErrorCategory::Io => -499..=-400,
        };
        assert!(band.contains(&err.code()), "{err} has code {}", err.code());
    }
}

// =============================================================================
// Context
// =============================================================================

#[test]
fn at_object_records_object_then_frames() {
    let err = Error::invalid_format("bad")
        .at_object("/DataStructure/A/B")
        .at_object("/DataStructure/A");
    let ctx = err.context.unwrap();
    assert_eq!(ctx.object.as_deref(), Some("/DataStructure/A/B"));
    assert_eq!(ctx.stack, vec!["/DataStructure/A".to_string()]);
}
