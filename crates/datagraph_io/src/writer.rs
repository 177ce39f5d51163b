//! Writes a graph into the current container layout.
//!
//! Every entity becomes one container object under `/DataStructure`, placed
//! at the first path the depth-first walk reaches it by. Later parents get a
//! hard link to that object, so a shared store is written once.

use std::collections::HashMap;
use std::io::{Seek, Write};

use datagraph_container::{ContainerWriter, ObjectRef};
use datagraph_foundation::{ElementType, EntityId, Error, ErrorKind, Result};
use datagraph_storage::{DataGraph, Entity, GeometryKind, GeometryRole, Payload, TypedArray, TypedList};
use tracing::{debug, info};

use crate::config::WriteOptions;
use crate::constants::{
    COMPONENT_SHAPE, CURRENT_VERSION, DATA_STRUCTURE, FILE_VERSION, GRID_DIMENSIONS, GRID_ORIGIN, GRID_SPACING,
    IMPORTABLE, LINKED_NUM_NEIGHBORS, NEXT_OBJECT_ID, NUM_NEIGHBORS_SUFFIX, OBJECT_ID, OBJECT_TYPE,
    SPATIAL_DIMENSIONALITY, TUPLE_DIMENSIONS, TUPLE_SHAPE, UNIT_DIMENSIONALITY, VERTEX_INDICES,
};

/// The on-disk element type of a store: booleans are stored as bytes and
/// recovered from the type tag.
pub(crate) fn stored_type(ty: ElementType) -> ElementType {
    if ty == ElementType::Bool { ElementType::UInt8 } else { ty }
}

/// Name of the row-length companion written next to a list.
#[must_use]
pub fn companion_name(list_name: &str) -> String {
    format!("{list_name}{NUM_NEIGHBORS_SUFFIX}")
}

#[derive(Clone, Copy, Debug)]
struct Written {
    object: ObjectRef,
    companion: Option<ObjectRef>,
}

/// Serializes one graph into a container.
#[derive(Debug)]
pub struct GraphWriter<'a, W: Write + Seek> {
    graph: &'a DataGraph,
    container: &'a mut ContainerWriter<W>,
    options: &'a WriteOptions,
    written: HashMap<EntityId, Written>,
    links: usize,
}

impl<'a, W: Write + Seek> GraphWriter<'a, W> {
    /// Creates a writer for `graph`.
    pub fn new(graph: &'a DataGraph, container: &'a mut ContainerWriter<W>, options: &'a WriteOptions) -> Self {
        Self {
            graph,
            container,
            options,
            written: HashMap::new(),
            links: 0,
        }
    }

    /// Writes the version tag and the whole graph.
    ///
    /// # Errors
    ///
    /// Returns an error if a store is a preflight placeholder, a list's
    /// companion name is taken by a sibling, or the container rejects a write.
    /// The container is left incomplete on failure.
    pub fn write(mut self) -> Result<()> {
        let root = self.container.root();
        self.container.set_attribute(root, FILE_VERSION, CURRENT_VERSION)?;
        let structure = self.container.create_group(root, DATA_STRUCTURE)?;
        self.container
            .set_attribute(structure, NEXT_OBJECT_ID, self.graph.next_id().raw())?;
        for (name, &id) in self.graph.top_level() {
            self.write_entity(structure, name, id)?;
        }
        info!(
            entities = self.written.len(),
            links = self.links,
            "wrote data graph"
        );
        Ok(())
    }

    fn write_entity(&mut self, group: ObjectRef, name: &str, id: EntityId) -> Result<()> {
        if let Some(written) = self.written.get(&id).copied() {
            self.container.link(group, name, written.object)?;
            if let Some(companion) = written.companion {
                self.container.link(group, &companion_name(name), companion)?;
            }
            self.links += 1;
            debug!(%id, name, "linked shared entity");
            return Ok(());
        }
        let graph = self.graph;
        let entity = graph.get(id)?;
        let written = self
            .write_object(group, name, entity)
            .map_err(|e| e.at_object(name.to_string()))?;
        self.written.insert(id, written);
        if entity.kind().is_container() {
            for (child_name, &child) in entity.children() {
                self.write_entity(written.object, child_name, child)?;
            }
            if let Payload::Geometry(geometry) = entity.payload() {
                if geometry.kind() == GeometryKind::Vertex {
                    self.write_vertex_indices(written.object, id)?;
                }
            }
        }
        Ok(())
    }

    fn write_object(&mut self, group: ObjectRef, name: &str, entity: &Entity) -> Result<Written> {
        let mut companion = None;
        let object = match entity.payload() {
            Payload::Group => self.container.create_group(group, name)?,
            Payload::AttributeTable(table) => {
                let object = self.container.create_group(group, name)?;
                self.container
                    .set_attribute(object, TUPLE_DIMENSIONS, table.tuple_shape())?;
                object
            }
            Payload::Geometry(geometry) => {
                let object = self.container.create_group(group, name)?;
                for (role, target) in geometry.references() {
                    self.container.set_attribute(object, role.tag(), target.raw())?;
                }
                self.container
                    .set_attribute(object, SPATIAL_DIMENSIONALITY, geometry.spatial_dimensionality())?;
                self.container
                    .set_attribute(object, UNIT_DIMENSIONALITY, geometry.unit_dimensionality())?;
                if let Some(grid) = geometry.grid() {
                    self.container
                        .set_attribute(object, GRID_DIMENSIONS, &grid.dimensions[..])?;
                    self.container.set_attribute(object, GRID_ORIGIN, &grid.origin[..])?;
                    self.container.set_attribute(object, GRID_SPACING, &grid.spacing[..])?;
                }
                object
            }
            Payload::Array(array) | Payload::Scalar(array) => self.write_array(group, name, array)?,
            Payload::List(list) => {
                let (object, lengths) = self.write_list(group, entity, name, list)?;
                companion = Some(lengths);
                object
            }
            Payload::Strings(strings) => {
                let values = strings.to_vec();
                let object = self.container.write_strings(group, name, &values)?;
                self.container
                    .set_attribute(object, TUPLE_DIMENSIONS, vec![values.len() as u64])?;
                object
            }
        };
        self.container
            .set_attribute(object, OBJECT_TYPE, entity.kind().type_name())?;
        self.container.set_attribute(object, OBJECT_ID, entity.id().raw())?;
        self.container
            .set_attribute(object, IMPORTABLE, i32::from(entity.is_importable()))?;
        Ok(Written { object, companion })
    }

    fn write_array(&mut self, group: ObjectRef, name: &str, array: &TypedArray) -> Result<ObjectRef> {
        let tuple_shape = array.tuple_shape();
        let component_shape = array.component_shape();
        let shape: Vec<usize> = tuple_shape.iter().chain(&component_shape).copied().collect();
        let ty = stored_type(array.element_type());

        let own_chunks = array.chunk_shape().filter(|_| self.options.preserve_chunking);
        let requested = self
            .options
            .chunk_shape
            .clone()
            .filter(|c| own_chunks.is_none() && c.len() == tuple_shape.len());
        let object = match (own_chunks, requested) {
            (Some(chunk_shape), _) => {
                self.container
                    .write_chunked_dataset(group, name, ty, &shape, &chunk_shape, |i| array.chunk_bytes(i))?
            }
            (None, Some(chunk_shape)) => {
                let tiled = array.duplicate();
                tiled.rechunk(&chunk_shape)?;
                self.container
                    .write_chunked_dataset(group, name, ty, &shape, &chunk_shape, |i| tiled.chunk_bytes(i))?
            }
            (None, None) => self.container.write_dataset(group, name, ty, &shape, &array.to_bytes()?)?,
        };
        self.container.set_attribute(object, TUPLE_SHAPE, &tuple_shape[..])?;
        self.container
            .set_attribute(object, COMPONENT_SHAPE, &component_shape[..])?;
        Ok(object)
    }

    fn write_list(
        &mut self,
        group: ObjectRef,
        entity: &Entity,
        name: &str,
        list: &TypedList,
    ) -> Result<(ObjectRef, ObjectRef)> {
        // Every parent gets a link to the companion, so none may hold a sibling of that name.
        let companion = companion_name(name);
        if let Some(parent) = entity
            .parents()
            .find(|&parent| self.graph.child(parent, &companion).is_some())
        {
            return Err(Error::name_collision(parent, companion));
        }
        let lengths = list
            .lengths()
            .into_iter()
            .map(|len| {
                i32::try_from(len)
                    .map_err(|_| Error::invalid_format(format!("row length {len} does not fit the length table")))
            })
            .collect::<Result<Vec<i32>>>()?;
        let mut length_bytes = Vec::with_capacity(lengths.len() * 4);
        for len in &lengths {
            length_bytes.extend_from_slice(&len.to_le_bytes());
        }

        let flat = list.flat_bytes();
        let ty = stored_type(list.element_type());
        let object = self
            .container
            .write_dataset(group, name, ty, &[flat.len() / ty.size()], &flat)?;
        self.container
            .set_attribute(object, TUPLE_SHAPE, &list.tuple_shape()[..])?;
        self.container
            .set_attribute(object, LINKED_NUM_NEIGHBORS, companion.as_str())?;

        let rows = lengths.len();
        let counts = self
            .container
            .write_dataset(group, &companion, ElementType::Int32, &[rows], &length_bytes)?;
        self.container.set_attribute(counts, OBJECT_TYPE, "DataArray<int32>")?;
        self.container.set_attribute(counts, IMPORTABLE, 0i32)?;
        self.container.set_attribute(counts, TUPLE_SHAPE, vec![rows as u64])?;
        self.container.set_attribute(counts, COMPONENT_SHAPE, vec![1u64])?;
        Ok((object, counts))
    }

    /// Emits `0..n` over the geometry's vertices for the XDMF topology.
    fn write_vertex_indices(&mut self, object: ObjectRef, geometry: EntityId) -> Result<()> {
        if self
            .graph
            .geometry_reference(geometry, GeometryRole::SharedVertices)?
            .is_none()
        {
            return Ok(());
        }
        if self.graph.child(geometry, VERTEX_INDICES).is_some() {
            return Err(Error::name_collision(geometry, VERTEX_INDICES));
        }
        let count = self.graph.number_of_vertices(geometry)?;
        let mut bytes = Vec::with_capacity(count * 8);
        for i in 0..count as i64 {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        let indices = self
            .container
            .write_dataset(object, VERTEX_INDICES, ElementType::Int64, &[count], &bytes)?;
        self.container.set_attribute(indices, OBJECT_TYPE, "DataArray<int64>")?;
        self.container.set_attribute(indices, IMPORTABLE, 0i32)?;
        self.container.set_attribute(indices, TUPLE_SHAPE, vec![count as u64])?;
        self.container.set_attribute(indices, COMPONENT_SHAPE, vec![1u64])?;
        Ok(())
    }
}

/// Writes `graph` into `container` with `options`.
///
/// # Errors
///
/// See [`GraphWriter::write`].
pub fn write_graph<W: Write + Seek>(
    graph: &DataGraph,
    container: &mut ContainerWriter<W>,
    options: &WriteOptions,
) -> Result<()> {
    GraphWriter::new(graph, container, options).write()
}

/// Placeholder stores cannot be written.
pub(crate) fn ensure_loaded(graph: &DataGraph) -> Result<()> {
    for entity in graph.entities() {
        let loaded = match entity.payload() {
            Payload::Array(array) | Payload::Scalar(array) => array.is_loaded(),
            Payload::List(list) => list.is_loaded(),
            Payload::Strings(strings) => strings.is_loaded(),
            Payload::AttributeTable(_) | Payload::Geometry(_) | Payload::Group => true,
        };
        if !loaded {
            return Err(Error::new(ErrorKind::PayloadNotLoaded(entity.name().to_string())).at_object(format!("{}", entity.id())));
        }
    }
    Ok(())
}
