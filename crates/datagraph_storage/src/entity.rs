//! Entities, their type tags, and their payloads.

use std::fmt;
use std::sync::Arc;

use datagraph_foundation::{ElementType, EntityId};
use im::{OrdMap, OrdSet};

use crate::geometry::{Geometry, GeometryKind};
use crate::strings::StringStore;
use crate::typed::{TypedArray, TypedList};

/// The type tag of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Plain grouping container.
    Group,
    /// Typed, shaped array.
    Array(ElementType),
    /// Single typed value.
    Scalar(ElementType),
    /// Variable-length list per tuple.
    List(ElementType),
    /// One string per tuple.
    Strings,
    /// Container whose children share one tuple shape.
    AttributeTable,
    /// Geometry referencing arrays and attribute tables.
    Geometry(GeometryKind),
}

impl EntityKind {
    /// The type name recorded in containers, e.g. `DataArray<float32>`.
    #[must_use]
    pub fn type_name(self) -> String {
        match self {
            Self::Group => "DataGroup".to_string(),
            Self::Array(ty) => format!("DataArray<{ty}>"),
            Self::Scalar(ty) => format!("ScalarData<{ty}>"),
            Self::List(ty) => format!("NeighborList<{ty}>"),
            Self::Strings => "StringArray".to_string(),
            Self::AttributeTable => "AttributeMatrix".to_string(),
            Self::Geometry(kind) => kind.type_name().to_string(),
        }
    }

    /// Parses a type name produced by [`EntityKind::type_name`].
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        let element = |prefix: &str| {
            name.strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix('>'))
                .and_then(ElementType::from_name)
        };
        match name {
            "DataGroup" => return Some(Self::Group),
            "StringArray" => return Some(Self::Strings),
            "AttributeMatrix" => return Some(Self::AttributeTable),
            _ => {}
        }
        if let Some(kind) = GeometryKind::from_type_name(name) {
            return Some(Self::Geometry(kind));
        }
        element("DataArray<")
            .map(Self::Array)
            .or_else(|| element("ScalarData<").map(Self::Scalar))
            .or_else(|| element("NeighborList<").map(Self::List))
    }

    /// Returns true for kinds that may hold children.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Group | Self::AttributeTable | Self::Geometry(_))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

/// Tuple-shape contract shared by every child of an attribute table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeTable {
    tuple_shape: Vec<usize>,
}

impl AttributeTable {
    /// Creates a table with the given tuple shape.
    #[must_use]
    pub fn new(tuple_shape: Vec<usize>) -> Self {
        Self { tuple_shape }
    }

    /// The tuple shape every child must match.
    #[must_use]
    pub fn tuple_shape(&self) -> &[usize] {
        &self.tuple_shape
    }

    /// Number of tuples.
    #[must_use]
    pub fn num_tuples(&self) -> usize {
        datagraph_foundation::shape_len(&self.tuple_shape)
    }

    pub(crate) fn set_tuple_shape(&mut self, tuple_shape: Vec<usize>) {
        self.tuple_shape = tuple_shape;
    }
}

/// What an entity holds.
///
/// Store payloads are reference counted: cloning a payload (or the graph)
/// shares the store, while [`Payload::duplicate`] copies it.
#[derive(Clone, Debug)]
pub enum Payload {
    /// A plain group.
    Group,
    /// A typed array.
    Array(Arc<TypedArray>),
    /// A one-element typed array.
    Scalar(Arc<TypedArray>),
    /// A list store.
    List(Arc<TypedList>),
    /// A string store.
    Strings(Arc<StringStore>),
    /// An attribute table.
    AttributeTable(AttributeTable),
    /// A geometry.
    Geometry(Geometry),
}

impl Payload {
    /// The type tag of this payload.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Group => EntityKind::Group,
            Self::Array(a) => EntityKind::Array(a.element_type()),
            Self::Scalar(a) => EntityKind::Scalar(a.element_type()),
            Self::List(l) => EntityKind::List(l.element_type()),
            Self::Strings(_) => EntityKind::Strings,
            Self::AttributeTable(_) => EntityKind::AttributeTable,
            Self::Geometry(g) => EntityKind::Geometry(g.kind()),
        }
    }

    /// Number of tuples for store payloads.
    #[must_use]
    pub fn tuple_count(&self) -> Option<usize> {
        match self {
            Self::Array(a) => Some(a.num_tuples()),
            Self::List(l) => Some(l.num_rows()),
            Self::Strings(s) => Some(s.len()),
            _ => None,
        }
    }

    /// Deep copy: stores are duplicated instead of shared.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Array(a) => Self::Array(Arc::new(a.duplicate())),
            Self::Scalar(a) => Self::Scalar(Arc::new(a.duplicate())),
            Self::List(l) => Self::List(Arc::new(l.duplicate())),
            Self::Strings(s) => Self::Strings(Arc::new(s.duplicate())),
            other => other.clone(),
        }
    }
}

/// A node of the entity graph.
#[derive(Clone, Debug)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) name: String,
    pub(crate) parents: OrdSet<EntityId>,
    pub(crate) children: OrdMap<String, EntityId>,
    pub(crate) importable: bool,
    pub(crate) payload: Payload,
}

impl Entity {
    pub(crate) fn new(id: EntityId, name: String, payload: Payload) -> Self {
        Self {
            id,
            name,
            parents: OrdSet::new(),
            children: OrdMap::new(),
            importable: true,
            payload,
        }
    }

    /// The entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type tag.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// The payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Parent ids in ascending order; [`EntityId::ROOT`] marks a top-level entity.
    pub fn parents(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.parents.iter().copied()
    }

    /// Number of parents.
    #[must_use]
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// Children by name, in name order.
    #[must_use]
    pub fn children(&self) -> &OrdMap<String, EntityId> {
        &self.children
    }

    /// Whether readers should import this entity.
    #[must_use]
    pub fn is_importable(&self) -> bool {
        self.importable
    }
}
