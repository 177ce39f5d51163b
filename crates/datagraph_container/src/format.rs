//! On-disk layout of a container file.
//!
//! ```text
//! +-----------+----------+--------------+-----------+------------------+-------+
//! | magic (8) | rev (u32)| index offset | index len | payload extents  | index |
//! |           |          |    (u64)     |   (u64)   | (raw LE bytes)   | (mp)  |
//! +-----------+----------+--------------+-----------+------------------+-------+
//! ```
//!
//! The index is a `MessagePack` object table written after every payload, so
//! a writer never seeks backwards except to patch the header. Object 0 is the
//! root group. A group maps child names to object numbers; two names mapping
//! to the same number are hard links to one object.

use std::collections::BTreeMap;
use std::fmt;

use datagraph_foundation::{ElementType, Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};

/// File signature.
pub const MAGIC: [u8; 8] = *b"\x89DGRAPH\n";

/// Layout revision written by this crate.
pub const REVISION: u32 = 1;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: u64 = 8 + 4 + 8 + 8;

/// Handle to a group or dataset in a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef(pub(crate) usize);

impl ObjectRef {
    /// The root group.
    pub const ROOT: Self = Self(0);

    /// The object number within the file.
    #[must_use]
    pub fn number(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object {}", self.0)
    }
}

/// A typed attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// UTF-8 string.
    String(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Float.
    Float(f64),
    /// Signed integer vector.
    IntArray(Vec<i64>),
    /// Unsigned integer vector.
    UIntArray(Vec<u64>),
    /// Float vector.
    FloatArray(Vec<f64>),
}

impl AttributeValue {
    /// The value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a signed integer, converting unsigned values that fit.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// The value as an unsigned integer, converting non-negative signed values.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// The value as an unsigned vector. Scalars become one-element vectors.
    #[must_use]
    pub fn as_u64_vec(&self) -> Option<Vec<u64>> {
        match self {
            Self::UIntArray(v) => Some(v.clone()),
            Self::IntArray(v) => v.iter().map(|x| u64::try_from(*x).ok()).collect(),
            Self::UInt(_) | Self::Int(_) => self.as_u64().map(|v| vec![v]),
            _ => None,
        }
    }

    /// The value as a float vector, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Self::FloatArray(v) => Some(v.clone()),
            Self::Float(v) => Some(vec![*v]),
            Self::IntArray(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Self::UIntArray(v) => Some(v.iter().map(|x| *x as f64).collect()),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<u64>> for AttributeValue {
    fn from(value: Vec<u64>) -> Self {
        Self::UIntArray(value)
    }
}

impl From<&[usize]> for AttributeValue {
    fn from(value: &[usize]) -> Self {
        Self::UIntArray(value.iter().map(|v| *v as u64).collect())
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(value: Vec<i64>) -> Self {
        Self::IntArray(value)
    }
}

impl From<Vec<f64>> for AttributeValue {
    fn from(value: Vec<f64>) -> Self {
        Self::FloatArray(value)
    }
}

impl From<&[f32]> for AttributeValue {
    fn from(value: &[f32]) -> Self {
        Self::FloatArray(value.iter().map(|v| f64::from(*v)).collect())
    }
}

/// Element type of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Packed little-endian numeric elements.
    Element(ElementType),
    /// Length-prefixed UTF-8 strings.
    String,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(ty) => write!(f, "{ty}"),
            Self::String => f.write_str("string"),
        }
    }
}

/// A byte range of the payload region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    /// Absolute file offset.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) enum Layout {
    Contiguous(Extent),
    /// One extent per chunk of the leading `chunk_shape.len()` dimensions.
    Chunked {
        chunk_shape: Vec<usize>,
        extents: Vec<Extent>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct GroupNode {
    pub(crate) attributes: BTreeMap<String, AttributeValue>,
    pub(crate) links: BTreeMap<String, ObjectRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct DatasetNode {
    pub(crate) attributes: BTreeMap<String, AttributeValue>,
    pub(crate) dtype: DataType,
    pub(crate) shape: Vec<usize>,
    pub(crate) layout: Layout,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) enum Node {
    Group(GroupNode),
    Dataset(DatasetNode),
}

impl Node {
    pub(crate) fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        match self {
            Self::Group(g) => &g.attributes,
            Self::Dataset(d) => &d.attributes,
        }
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, AttributeValue> {
        match self {
            Self::Group(g) => &mut g.attributes,
            Self::Dataset(d) => &mut d.attributes,
        }
    }
}

/// The object table stored at the end of the file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Index {
    pub(crate) objects: Vec<Node>,
}

impl Index {
    pub(crate) fn new() -> Self {
        Self {
            objects: vec![Node::Group(GroupNode::default())],
        }
    }

    pub(crate) fn node(&self, object: ObjectRef) -> Result<&Node> {
        self.objects
            .get(object.0)
            .ok_or_else(|| Error::out_of_range(object.0, self.objects.len()))
    }

    pub(crate) fn node_mut(&mut self, object: ObjectRef) -> Result<&mut Node> {
        let len = self.objects.len();
        self.objects.get_mut(object.0).ok_or_else(|| Error::out_of_range(object.0, len))
    }

    pub(crate) fn group(&self, object: ObjectRef) -> Result<&GroupNode> {
        match self.node(object)? {
            Node::Group(g) => Ok(g),
            Node::Dataset(_) => Err(not_a(object, "group")),
        }
    }

    pub(crate) fn group_mut(&mut self, object: ObjectRef) -> Result<&mut GroupNode> {
        match self.node_mut(object)? {
            Node::Group(g) => Ok(g),
            Node::Dataset(_) => Err(not_a(object, "group")),
        }
    }

    pub(crate) fn dataset(&self, object: ObjectRef) -> Result<&DatasetNode> {
        match self.node(object)? {
            Node::Dataset(d) => Ok(d),
            Node::Group(_) => Err(not_a(object, "dataset")),
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        let index: Self =
            rmp_serde::from_slice(bytes).map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))?;
        index.check()?;
        Ok(index)
    }

    /// Rejects indexes whose links point outside the table or whose root is
    /// not a group.
    fn check(&self) -> Result<()> {
        if !matches!(self.objects.first(), Some(Node::Group(_))) {
            return Err(Error::invalid_format("container root is not a group"));
        }
        for node in &self.objects {
            if let Node::Group(group) = node {
                for (name, target) in &group.links {
                    if target.0 >= self.objects.len() {
                        return Err(Error::invalid_format(format!("link '{name}' points past the object table")));
                    }
                }
            }
        }
        Ok(())
    }
}

fn not_a(object: ObjectRef, what: &str) -> Error {
    Error::type_mismatch(what, format!("{object}"))
}

/// Encodes strings as `u32` length prefixes followed by UTF-8 bytes.
pub(crate) fn encode_strings(values: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(values.iter().map(|s| s.len() + 4).sum());
    for value in values {
        let len = u32::try_from(value.len()).map_err(|_| Error::invalid_format("string longer than 4 GiB"))?;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    Ok(out)
}

pub(crate) fn decode_strings(bytes: &[u8], count: usize) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(count);
    let mut rest = bytes;
    for _ in 0..count {
        let (len, tail) = rest
            .split_first_chunk::<4>()
            .ok_or_else(|| Error::invalid_format("truncated string length"))?;
        let len = u32::from_le_bytes(*len) as usize;
        if tail.len() < len {
            return Err(Error::invalid_format("truncated string payload"));
        }
        let (text, tail) = tail.split_at(len);
        let text = std::str::from_utf8(text).map_err(|e| Error::invalid_format(e.to_string()))?;
        out.push(text.to_string());
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(Error::invalid_format("trailing bytes after strings"));
    }
    Ok(out)
}
