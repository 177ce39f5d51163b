//! Reads a graph from the current container layout.
//!
//! Objects are imported with their recorded ids. An id seen a second time
//! is a hard link, and its object only gains another parent. Objects whose
//! `Importable` attribute is absent or zero are skipped with their subtree.

use std::sync::Arc;

use datagraph_container::{AttributeValue, ContainerReader, DataType, ObjectRef};
use datagraph_foundation::{ElementType, EntityId, Error, ErrorKind, Result, shape_len};
use datagraph_storage::{
    AttributeTable, DataGraph, EntityKind, Geometry, GeometryKind, GeometryRole, GridSpec, Payload, StringStore,
    TypedArray, TypedList,
};
use tracing::{debug, info};

use crate::config::ReadOptions;
use crate::constants::{
    COMPONENT_SHAPE, DATA_STRUCTURE, GRID_DIMENSIONS, GRID_ORIGIN, GRID_SPACING, IMPORTABLE, LINKED_NUM_NEIGHBORS,
    NEXT_OBJECT_ID, OBJECT_ID, OBJECT_TYPE, SPATIAL_DIMENSIONALITY, TUPLE_DIMENSIONS, TUPLE_SHAPE,
    UNIT_DIMENSIONALITY,
};
use crate::source::ContainerChunkSource;
use crate::writer::stored_type;

/// Attribute lookups that report the object path when something is missing.
pub(crate) struct Attributes<'r> {
    reader: &'r ContainerReader,
    object: ObjectRef,
    path: &'r str,
}

impl<'r> Attributes<'r> {
    pub(crate) fn new(reader: &'r ContainerReader, object: ObjectRef, path: &'r str) -> Self {
        Self { reader, object, path }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&'r AttributeValue> {
        self.reader.attribute(self.object, name)
    }

    fn require(&self, name: &str) -> Result<&'r AttributeValue> {
        self.get(name)
            .ok_or_else(|| Error::missing_metadata(self.path, name))
    }

    fn malformed(&self, name: &str) -> Error {
        Error::invalid_format(format!("attribute '{name}' on {} has the wrong type", self.path))
    }

    pub(crate) fn string(&self, name: &str) -> Result<&'r str> {
        self.require(name)?.as_str().ok_or_else(|| self.malformed(name))
    }

    pub(crate) fn uint(&self, name: &str) -> Result<u64> {
        self.require(name)?.as_u64().ok_or_else(|| self.malformed(name))
    }

    pub(crate) fn shape(&self, name: &str) -> Result<Vec<usize>> {
        let values = self.require(name)?.as_u64_vec().ok_or_else(|| self.malformed(name))?;
        values
            .into_iter()
            .map(|v| usize::try_from(v).map_err(|_| self.malformed(name)))
            .collect()
    }

    fn floats3(&self, name: &str) -> Result<[f32; 3]> {
        let values = self.require(name)?.as_f64_vec().ok_or_else(|| self.malformed(name))?;
        match values.as_slice() {
            #[allow(clippy::cast_possible_truncation)]
            [x, y, z] => Ok([*x as f32, *y as f32, *z as f32]),
            _ => Err(self.malformed(name)),
        }
    }
}

/// Checks that a dataset holds `ty` elements (booleans are stored as bytes)
/// and `len` of them.
pub(crate) fn check_dataset(
    reader: &ContainerReader,
    object: ObjectRef,
    path: &str,
    ty: ElementType,
    len: usize,
) -> Result<()> {
    let info = reader.dataset_info(object)?;
    let stored = DataType::Element(stored_type(ty));
    if info.dtype != stored && info.dtype != DataType::Element(ty) {
        return Err(Error::type_mismatch(stored.to_string(), info.dtype.to_string()).at_object(path));
    }
    let actual = shape_len(&info.shape);
    if actual != len {
        return Err(Error::shape_mismatch(&[len], &[actual]).at_object(path));
    }
    Ok(())
}

/// Builds an array store over a dataset: a placeholder in preflight, a lazy
/// chunked store when the dataset's chunks tile the tuple dimensions, and a
/// contiguous store otherwise.
pub(crate) fn load_array(
    reader: &ContainerReader,
    object: ObjectRef,
    path: &str,
    ty: ElementType,
    tuple_shape: Vec<usize>,
    component_shape: Vec<usize>,
    options: &ReadOptions,
) -> Result<TypedArray> {
    check_dataset(reader, object, path, ty, shape_len(&tuple_shape) * shape_len(&component_shape))?;
    if options.preflight {
        return Ok(TypedArray::empty(ty, tuple_shape, component_shape));
    }
    let chunk_shape = reader.dataset_info(object)?.chunk_shape;
    match chunk_shape {
        Some(chunk_shape) if options.lazy && chunk_shape.len() == tuple_shape.len() => {
            let source = ContainerChunkSource::new(path, reader.chunks(object)?);
            TypedArray::from_raw_chunks(ty, tuple_shape, component_shape, &chunk_shape, Arc::new(source))
        }
        _ => TypedArray::from_bytes(ty, tuple_shape, component_shape, &reader.read_dataset(object)?),
    }
}

/// Reads a row-length table stored as any integer dataset.
pub(crate) fn read_lengths(reader: &ContainerReader, object: ObjectRef, path: &str) -> Result<Vec<usize>> {
    let info = reader.dataset_info(object)?;
    let DataType::Element(ty) = info.dtype else {
        return Err(Error::type_mismatch("integer dataset", info.dtype.to_string()).at_object(path));
    };
    let rows = shape_len(&info.shape);
    let counts = TypedArray::from_bytes(ty, vec![rows], vec![1], &reader.read_dataset(object)?)?;
    counts.to_indices().map_err(|e| e.at_object(path))
}

/// Builds a list store from a flat dataset and its length table.
pub(crate) fn load_list(
    reader: &ContainerReader,
    object: ObjectRef,
    counts: ObjectRef,
    path: &str,
    ty: ElementType,
    tuple_shape: Vec<usize>,
    options: &ReadOptions,
) -> Result<TypedList> {
    let flat_len = shape_len(&reader.dataset_info(object)?.shape);
    check_dataset(reader, object, path, ty, flat_len)?;
    if options.preflight {
        return Ok(TypedList::empty(ty, tuple_shape));
    }
    let lengths = read_lengths(reader, counts, path)?;
    if lengths.len() != shape_len(&tuple_shape) {
        return Err(Error::shape_mismatch(&tuple_shape, &[lengths.len()]).at_object(path));
    }
    TypedList::from_flat_bytes(ty, tuple_shape, &lengths, &reader.read_dataset(object)?)
}

/// Builds a string store; preflight yields a placeholder of the right count.
pub(crate) fn load_strings(
    reader: &ContainerReader,
    object: ObjectRef,
    count: usize,
    options: &ReadOptions,
) -> Result<StringStore> {
    if options.preflight {
        return Ok(StringStore::empty(count));
    }
    let values = reader.read_strings(object)?;
    if values.len() != count {
        return Err(Error::shape_mismatch(&[count], &[values.len()]));
    }
    Ok(StringStore::from_vec(values))
}

/// Reads the current layout into a new graph.
#[derive(Debug)]
pub struct GraphReader<'r> {
    reader: &'r ContainerReader,
    options: &'r ReadOptions,
    graph: DataGraph,
    skipped: usize,
}

impl<'r> GraphReader<'r> {
    /// Creates a reader over an open container.
    #[must_use]
    pub fn new(reader: &'r ContainerReader, options: &'r ReadOptions) -> Self {
        Self {
            reader,
            options,
            graph: DataGraph::new(),
            skipped: 0,
        }
    }

    /// Reads every importable object under `/DataStructure`.
    ///
    /// # Errors
    ///
    /// Returns an error if an object has an unknown type, lacks required
    /// metadata, or is inconsistent with its shape contract. The partial
    /// graph is discarded.
    pub fn read(mut self) -> Result<DataGraph> {
        let root = self.reader.root();
        let structure = self
            .reader
            .child(root, DATA_STRUCTURE)
            .ok_or_else(|| Error::missing_metadata("/", DATA_STRUCTURE))?;
        for (name, object) in self.reader.children(structure)? {
            let path = format!("/{DATA_STRUCTURE}/{name}");
            self.read_object(structure, object, EntityId::ROOT, &name, &path)?;
        }
        if let Some(next) = self.reader.attribute(structure, NEXT_OBJECT_ID).and_then(AttributeValue::as_u64) {
            self.graph.set_next_id(EntityId::new(next));
        }
        info!(
            entities = self.graph.len(),
            skipped = self.skipped,
            preflight = self.options.preflight,
            "read data graph"
        );
        Ok(self.graph)
    }

    fn read_object(
        &mut self,
        group: ObjectRef,
        object: ObjectRef,
        parent: EntityId,
        name: &str,
        path: &str,
    ) -> Result<()> {
        let attrs = Attributes::new(self.reader, object, path);
        match attrs.get(IMPORTABLE).and_then(AttributeValue::as_i64) {
            Some(flag) if flag != 0 => {}
            _ => {
                debug!(path, "skipping non-importable object");
                self.skipped += 1;
                return Ok(());
            }
        }
        let id = EntityId::new(attrs.uint(OBJECT_ID)?);
        if self.graph.contains(id) {
            return self.graph.add_parent(id, parent).map_err(|e| e.at_object(path));
        }
        let type_name = attrs.string(OBJECT_TYPE)?;
        let kind = EntityKind::from_type_name(type_name)
            .ok_or_else(|| Error::unknown_type(type_name).at_object(path))?;
        let payload = self.payload(group, object, kind, path).map_err(|e| e.at_object(path))?;
        self.graph
            .import(parent, name, id, payload)
            .map_err(|e| e.at_object(path))?;

        if kind.is_container() {
            if !self.reader.is_group(object) {
                return Err(Error::invalid_format(format!("{type_name} must be a group")).at_object(path));
            }
            for (child_name, child) in self.reader.children(object)? {
                let child_path = format!("{path}/{child_name}");
                self.read_object(object, child, id, &child_name, &child_path)?;
            }
        }
        Ok(())
    }

    fn payload(&self, group: ObjectRef, object: ObjectRef, kind: EntityKind, path: &str) -> Result<Payload> {
        let attrs = Attributes::new(self.reader, object, path);
        let reader = self.reader;
        Ok(match kind {
            EntityKind::Group => Payload::Group,
            EntityKind::AttributeTable => Payload::AttributeTable(AttributeTable::new(attrs.shape(TUPLE_DIMENSIONS)?)),
            EntityKind::Geometry(kind) => Payload::Geometry(read_geometry(&attrs, kind)?),
            EntityKind::Array(ty) => Payload::Array(Arc::new(load_array(
                reader,
                object,
                path,
                ty,
                attrs.shape(TUPLE_SHAPE)?,
                attrs.shape(COMPONENT_SHAPE)?,
                self.options,
            )?)),
            EntityKind::Scalar(ty) => {
                Payload::Scalar(Arc::new(load_array(reader, object, path, ty, vec![1], vec![1], self.options)?))
            }
            EntityKind::List(ty) => {
                let companion = attrs.string(LINKED_NUM_NEIGHBORS)?;
                let counts = reader.child(group, companion).ok_or_else(|| {
                    Error::invalid_format(format!("length table '{companion}' is missing")).at_object(path)
                })?;
                let tuple_shape = match attrs.get(TUPLE_SHAPE) {
                    Some(_) => attrs.shape(TUPLE_SHAPE)?,
                    None => vec![shape_len(&reader.dataset_info(counts)?.shape)],
                };
                Payload::List(Arc::new(load_list(
                    reader,
                    object,
                    counts,
                    path,
                    ty,
                    tuple_shape,
                    self.options,
                )?))
            }
            EntityKind::Strings => {
                let count = match attrs.get(TUPLE_DIMENSIONS) {
                    Some(_) => shape_len(&attrs.shape(TUPLE_DIMENSIONS)?),
                    None => shape_len(&reader.dataset_info(object)?.shape),
                };
                Payload::Strings(Arc::new(load_strings(reader, object, count, self.options)?))
            }
        })
    }
}

fn read_geometry(attrs: &Attributes<'_>, kind: GeometryKind) -> Result<Geometry> {
    let mut geometry = Geometry::new(kind);
    for role in GeometryRole::ALL {
        if attrs.get(role.tag()).is_some() {
            geometry.set_reference(role, Some(EntityId::new(attrs.uint(role.tag())?)));
        }
    }
    let spatial = match attrs.get(SPATIAL_DIMENSIONALITY) {
        Some(_) => dimensionality(attrs, SPATIAL_DIMENSIONALITY)?,
        None => geometry.spatial_dimensionality(),
    };
    let unit = match attrs.get(UNIT_DIMENSIONALITY) {
        Some(_) => dimensionality(attrs, UNIT_DIMENSIONALITY)?,
        None => geometry.unit_dimensionality(),
    };
    geometry = geometry.with_dimensionality(spatial, unit);
    if attrs.get(GRID_DIMENSIONS).is_some() {
        let dims = attrs.shape(GRID_DIMENSIONS)?;
        let [x, y, z] = dims[..] else {
            return Err(Error::shape_mismatch(&[3], &[dims.len()]).at_object(GRID_DIMENSIONS));
        };
        geometry.set_grid(Some(GridSpec {
            dimensions: [x, y, z],
            origin: attrs.floats3(GRID_ORIGIN)?,
            spacing: attrs.floats3(GRID_SPACING)?,
        }));
    } else if kind == GeometryKind::Image {
        return Err(Error::missing_metadata(attrs.path, GRID_DIMENSIONS));
    }
    Ok(geometry)
}

fn dimensionality(attrs: &Attributes<'_>, name: &str) -> Result<u32> {
    let value = attrs.uint(name)?;
    u32::try_from(value).map_err(|_| attrs.malformed(name))
}

/// Reads the current layout from an open container.
///
/// # Errors
///
/// See [`GraphReader::read`].
pub fn read_graph(reader: &ContainerReader, options: &ReadOptions) -> Result<DataGraph> {
    GraphReader::new(reader, options).read()
}

/// Whether an error came from content this build cannot interpret, as
/// opposed to a broken file.
#[must_use]
pub fn is_unknown_content(error: &Error) -> bool {
    matches!(error.kind, ErrorKind::UnknownType(_) | ErrorKind::MissingMetadata { .. })
}
