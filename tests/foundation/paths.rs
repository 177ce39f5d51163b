//! Integration tests for DataPath
//!
//! Tests parsing, display, joining, and name validation.

use datagraph_foundation::{DataPath, ErrorKind, validate_name};

#[test]
fn parse_and_display() {
    let path = DataPath::parse("/Image/Cell Data/Phases").unwrap();
    assert_eq!(path.len(), 3);
    assert_eq!(path.to_string(), "/Image/Cell Data/Phases");
    assert_eq!(path.name(), Some("Phases"));
}

#[test]
fn leading_and_trailing_separators_are_ignored() {
    assert_eq!(DataPath::parse("A/B").unwrap(), DataPath::parse("/A/B/").unwrap());
}

#[test]
fn root_path() {
    let root = DataPath::parse("/").unwrap();
    assert!(root.is_empty());
    assert_eq!(root, DataPath::root());
    assert_eq!(root.to_string(), "/");
    assert_eq!(root.parent(), None);
}

#[test]
fn empty_segment_is_rejected() {
    let err = DataPath::parse("A//B").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidName(_)));
}

#[test]
fn join_and_parent() {
    let path = DataPath::root().join("A").unwrap().join("B").unwrap();
    assert_eq!(path.to_string(), "/A/B");
    assert_eq!(path.parent().unwrap().to_string(), "/A");
    assert!(path.join("x/y").is_err());
}

#[test]
fn from_str_parses() {
    let path: DataPath = "A/B/C".parse().unwrap();
    assert_eq!(path.segments(), ["A", "B", "C"]);
}

#[test]
fn names() {
    assert!(validate_name("Cell Data").is_ok());
    assert!(validate_name("").is_err());
    assert!(validate_name("a/b").is_err());
}
