//! Imports the legacy container layout.
//!
//! Legacy files hold `/DataContainers/<container>`, each with an optional
//! `_SIMPL_GEOMETRY` group and one group per attribute matrix. Tuple
//! dimensions are stored fastest axis first and are reversed on import.
//! Entities get fresh ids, since the legacy layout records none.

use std::sync::Arc;

use datagraph_container::{AttributeValue, ContainerReader, DataType, ObjectRef};
use datagraph_foundation::{ElementType, EntityId, Error, Result, shape_len};
use datagraph_storage::{
    DataGraph, DataStore, Geometry, GeometryKind, GeometryRole, GridSpec, Payload, TypedArray,
};
use tracing::{debug, info, warn};

use crate::config::ReadOptions;
use crate::constants::legacy::{
    ATTRIBUTE_MATRIX_TYPE, BOOL_ARRAY, CELL_MATRIX, COMPONENT_DIMENSIONS, DATA_CONTAINERS, DIMENSIONS, EDGE_MATRIX,
    FACE_MATRIX, GEOMETRY_GROUP, GEOMETRY_TYPE_NAME, ORIGIN, SHARED_EDGE_LIST, SHARED_HEX_LIST, SHARED_QUAD_LIST,
    SHARED_TET_LIST, SHARED_TRI_LIST, SHARED_VERTEX_LIST, SPACING, STRING_ARRAY, VERTEX_MATRIX, X_BOUNDS, Y_BOUNDS,
    Z_BOUNDS,
};
use crate::constants::{LINKED_NUM_NEIGHBORS, OBJECT_TYPE, SPATIAL_DIMENSIONALITY, TUPLE_DIMENSIONS, UNIT_DIMENSIONALITY};
use crate::reader::{Attributes, load_array, load_list, load_strings, read_lengths};

/// Maps a legacy geometry type name to its kind.
#[must_use]
pub fn legacy_geometry_kind(name: &str) -> Option<GeometryKind> {
    Some(match name {
        "ImageGeometry" => GeometryKind::Image,
        "RectGridGeometry" => GeometryKind::RectGrid,
        "VertexGeometry" => GeometryKind::Vertex,
        "EdgeGeometry" => GeometryKind::Edge,
        "TriangleGeometry" => GeometryKind::Triangle,
        "QuadrilateralGeometry" => GeometryKind::Quad,
        "TetrahedralGeometry" => GeometryKind::Tetrahedral,
        "HexahedralGeometry" => GeometryKind::Hexahedral,
        _ => return None,
    })
}

/// The geometry role an attribute matrix of `matrix_type` fills, if any.
fn matrix_role(kind: GeometryKind, matrix_type: u64) -> Option<GeometryRole> {
    use GeometryKind::{Edge, Hexahedral, Quad, Tetrahedral, Triangle};
    match matrix_type {
        VERTEX_MATRIX if !kind.is_grid() => Some(GeometryRole::VertexData),
        EDGE_MATRIX if matches!(kind, Edge | Triangle | Quad | Tetrahedral | Hexahedral) => {
            Some(GeometryRole::EdgeData)
        }
        FACE_MATRIX if matches!(kind, Triangle | Quad | Tetrahedral | Hexahedral) => Some(GeometryRole::FaceData),
        CELL_MATRIX if kind.is_grid() => Some(GeometryRole::CellData),
        CELL_MATRIX if matches!(kind, Tetrahedral | Hexahedral) => Some(GeometryRole::PolyhedronData),
        _ => None,
    }
}

fn reversed(mut shape: Vec<usize>) -> Vec<usize> {
    shape.reverse();
    shape
}

/// Imports the legacy layout into a new graph.
#[derive(Debug)]
pub struct LegacyImporter<'r> {
    reader: &'r ContainerReader,
    options: &'r ReadOptions,
    graph: DataGraph,
}

impl<'r> LegacyImporter<'r> {
    /// Creates an importer over an open container.
    #[must_use]
    pub fn new(reader: &'r ContainerReader, options: &'r ReadOptions) -> Self {
        Self {
            reader,
            options,
            graph: DataGraph::new(),
        }
    }

    /// Imports every data container.
    ///
    /// # Errors
    ///
    /// Returns an error if `/DataContainers` is missing, a geometry type is
    /// unknown, required metadata is absent, or an array disagrees with its
    /// attribute matrix.
    pub fn import(mut self) -> Result<DataGraph> {
        let root = self.reader.root();
        let containers = self
            .reader
            .child(root, DATA_CONTAINERS)
            .ok_or_else(|| Error::missing_metadata("/", DATA_CONTAINERS))?;
        for (name, group) in self.reader.children(containers)? {
            let path = format!("/{DATA_CONTAINERS}/{name}");
            self.import_container(group, &name, &path)
                .map_err(|e| e.at_object(path.clone()))?;
        }
        info!(entities = self.graph.len(), preflight = self.options.preflight, "imported legacy layout");
        Ok(self.graph)
    }

    fn import_container(&mut self, group: ObjectRef, name: &str, path: &str) -> Result<()> {
        let container = match self.reader.child(group, GEOMETRY_GROUP) {
            Some(geometry) => self.import_geometry(geometry, name, &format!("{path}/{GEOMETRY_GROUP}"))?,
            None => self.graph.create_group(EntityId::ROOT, name)?,
        };
        for (matrix_name, matrix) in self.reader.children(group)? {
            if matrix_name == GEOMETRY_GROUP {
                continue;
            }
            let matrix_path = format!("{path}/{matrix_name}");
            if !self.reader.is_group(matrix) {
                warn!(path = %matrix_path, "ignoring dataset outside an attribute matrix");
                continue;
            }
            self.import_matrix(container, matrix, &matrix_name, &matrix_path)
                .map_err(|e| e.at_object(matrix_path.clone()))?;
        }
        Ok(())
    }

    fn import_geometry(&mut self, group: ObjectRef, name: &str, path: &str) -> Result<EntityId> {
        let attrs = Attributes::new(self.reader, group, path);
        let type_name = attrs.string(GEOMETRY_TYPE_NAME)?;
        let kind = legacy_geometry_kind(type_name).ok_or_else(|| Error::unknown_type(type_name))?;

        let mut geometry = Geometry::new(kind);
        let spatial = attrs.get(SPATIAL_DIMENSIONALITY).and_then(AttributeValue::as_i64);
        let unit = attrs.get(UNIT_DIMENSIONALITY).and_then(AttributeValue::as_i64);
        if let (Some(spatial), Some(unit)) = (spatial, unit) {
            let spatial = u32::try_from(spatial).map_err(|_| bad_dimensionality(SPATIAL_DIMENSIONALITY))?;
            let unit = u32::try_from(unit).map_err(|_| bad_dimensionality(UNIT_DIMENSIONALITY))?;
            geometry = geometry.with_dimensionality(spatial, unit);
        }
        match kind {
            GeometryKind::Image => {
                let dims = self.require(group, DIMENSIONS, path)?;
                let origin = self.require(group, ORIGIN, path)?;
                let spacing = self.require(group, SPACING, path)?;
                geometry.set_grid(Some(GridSpec {
                    dimensions: self.read_dimensions(dims, path)?,
                    origin: self.read_floats3(origin, path)?,
                    spacing: self.read_floats3(spacing, path)?,
                }));
            }
            GeometryKind::RectGrid => {
                if let Some(dims) = self.reader.child(group, DIMENSIONS) {
                    geometry.set_grid(Some(GridSpec::with_dimensions(self.read_dimensions(dims, path)?)));
                }
            }
            _ => {}
        }
        let id = self.graph.create_geometry(EntityId::ROOT, name, geometry)?;

        let arrays: &[(&str, GeometryRole, bool)] = match kind {
            GeometryKind::Image => &[],
            GeometryKind::RectGrid => &[
                (X_BOUNDS, GeometryRole::XBounds, false),
                (Y_BOUNDS, GeometryRole::YBounds, false),
                (Z_BOUNDS, GeometryRole::ZBounds, false),
            ],
            GeometryKind::Vertex => &[(SHARED_VERTEX_LIST, GeometryRole::SharedVertices, false)],
            GeometryKind::Edge => &[
                (SHARED_VERTEX_LIST, GeometryRole::SharedVertices, false),
                (SHARED_EDGE_LIST, GeometryRole::SharedEdges, true),
            ],
            GeometryKind::Triangle => &[
                (SHARED_VERTEX_LIST, GeometryRole::SharedVertices, false),
                (SHARED_TRI_LIST, GeometryRole::SharedFaces, true),
            ],
            GeometryKind::Quad => &[
                (SHARED_VERTEX_LIST, GeometryRole::SharedVertices, false),
                (SHARED_QUAD_LIST, GeometryRole::SharedFaces, true),
            ],
            GeometryKind::Tetrahedral => &[
                (SHARED_VERTEX_LIST, GeometryRole::SharedVertices, false),
                (SHARED_TET_LIST, GeometryRole::SharedPolyhedra, true),
            ],
            GeometryKind::Hexahedral => &[
                (SHARED_VERTEX_LIST, GeometryRole::SharedVertices, false),
                (SHARED_HEX_LIST, GeometryRole::SharedPolyhedra, true),
            ],
        };
        for &(array_name, role, connectivity) in arrays {
            let array_path = format!("{path}/{array_name}");
            let object = self.require(group, array_name, path)?;
            let array = if connectivity {
                self.connectivity_array(object, &array_path)?
            } else {
                let array = self.legacy_array(object, &array_path)?;
                if array.element_type() != ElementType::Float32 {
                    return Err(Error::type_mismatch("float32", array.element_type().name()).at_object(array_path));
                }
                array
            };
            let child = self.graph.create_array(id, array_name, array)?;
            self.graph.geometry_mut(id)?.set_reference(role, Some(child));
        }
        debug!(name, %kind, "imported legacy geometry");
        Ok(id)
    }

    fn require(&self, group: ObjectRef, name: &str, path: &str) -> Result<ObjectRef> {
        self.reader
            .child(group, name)
            .ok_or_else(|| Error::missing_metadata(path, name))
    }

    fn read_dimensions(&self, object: ObjectRef, path: &str) -> Result<[usize; 3]> {
        let dims = read_lengths(self.reader, object, path)?;
        match dims[..] {
            [x, y, z] => Ok([x, y, z]),
            _ => Err(Error::shape_mismatch(&[3], &[dims.len()]).at_object(path)),
        }
    }

    fn read_floats3(&self, object: ObjectRef, path: &str) -> Result<[f32; 3]> {
        let values = TypedArray::from_bytes(ElementType::Float32, vec![3], vec![1], &self.reader.read_dataset(object)?)
            .map_err(|e| e.at_object(path))?;
        let store = values.as_store::<f32>()?;
        Ok([store.get_flat(0)?, store.get_flat(1)?, store.get_flat(2)?])
    }

    /// Reads `ComponentDimensions` and reversed `TupleDimensions`.
    fn dims(&self, object: ObjectRef, path: &str) -> Result<(Vec<usize>, Vec<usize>)> {
        let attrs = Attributes::new(self.reader, object, path);
        Ok((reversed(attrs.shape(TUPLE_DIMENSIONS)?), attrs.shape(COMPONENT_DIMENSIONS)?))
    }

    fn element_type(&self, object: ObjectRef, path: &str) -> Result<ElementType> {
        let DataType::Element(ty) = self.reader.dataset_info(object)?.dtype else {
            return Err(Error::type_mismatch("numeric dataset", "string dataset").at_object(path));
        };
        let tag = self.reader.attribute(object, OBJECT_TYPE).and_then(AttributeValue::as_str);
        Ok(if ty == ElementType::UInt8 && tag == Some(BOOL_ARRAY) {
            ElementType::Bool
        } else {
            ty
        })
    }

    fn legacy_array(&self, object: ObjectRef, path: &str) -> Result<TypedArray> {
        let ty = self.element_type(object, path)?;
        let (tuple_shape, component_shape) = self.dims(object, path)?;
        load_array(self.reader, object, path, ty, tuple_shape, component_shape, self.options)
    }

    /// Connectivity lists are always imported as `u64`.
    fn connectivity_array(&self, object: ObjectRef, path: &str) -> Result<TypedArray> {
        let array = self.legacy_array(object, path)?;
        if !array.is_loaded() {
            return Ok(TypedArray::empty(ElementType::UInt64, array.tuple_shape(), array.component_shape()));
        }
        if array.element_type() == ElementType::UInt64 {
            return Ok(array);
        }
        let values = array.to_indices().map_err(|e| e.at_object(path))?;
        let store = DataStore::from_vec(
            array.tuple_shape(),
            array.component_shape(),
            values.into_iter().map(|v| v as u64).collect(),
        )?;
        Ok(TypedArray::from(store))
    }

    fn import_matrix(&mut self, container: EntityId, group: ObjectRef, name: &str, path: &str) -> Result<()> {
        let attrs = Attributes::new(self.reader, group, path);
        let tuple_shape = reversed(attrs.shape(TUPLE_DIMENSIONS)?);
        let table = self.graph.create_attribute_table(container, name, tuple_shape.clone())?;

        for (array_name, object) in self.reader.children(group)? {
            let array_path = format!("{path}/{array_name}");
            if !self.reader.is_dataset(object) {
                warn!(path = %array_path, "ignoring group inside an attribute matrix");
                continue;
            }
            let tag = Attributes::new(self.reader, object, &array_path)
                .string(OBJECT_TYPE)?
                .to_string();
            let payload = if tag.starts_with("NeighborList<") {
                let ty = self.element_type(object, &array_path)?;
                let companion = Attributes::new(self.reader, object, &array_path).string(LINKED_NUM_NEIGHBORS)?;
                let counts = self.require(group, companion, &array_path)?;
                let rows = vec![shape_len(&self.dims(object, &array_path)?.0)];
                Payload::List(Arc::new(load_list(
                    self.reader,
                    object,
                    counts,
                    &array_path,
                    ty,
                    rows,
                    self.options,
                )?))
            } else if tag == STRING_ARRAY {
                let (tuples, components) = self.dims(object, &array_path)?;
                let count = shape_len(&tuples) * shape_len(&components);
                Payload::Strings(Arc::new(load_strings(self.reader, object, count, self.options)?))
            } else {
                Payload::Array(Arc::new(self.legacy_array(object, &array_path)?))
            };
            self.graph
                .create(table, &array_name, payload)
                .map_err(|e| e.at_object(array_path.clone()))?;
        }

        let Some(matrix_type) = attrs.get(ATTRIBUTE_MATRIX_TYPE).and_then(AttributeValue::as_u64) else {
            return Ok(());
        };
        let Ok(geometry) = self.graph.geometry(container) else {
            return Ok(());
        };
        if let Some(role) = matrix_role(geometry.kind(), matrix_type) {
            if geometry.reference(role).is_some() {
                warn!(path, role = role.label(), "geometry already has this attribute matrix");
            } else {
                self.graph.geometry_mut(container)?.set_reference(role, Some(table));
            }
        }
        Ok(())
    }
}

fn bad_dimensionality(name: &str) -> Error {
    Error::invalid_format(format!("'{name}' is out of range"))
}

/// Imports the legacy layout from an open container.
///
/// # Errors
///
/// See [`LegacyImporter::import`].
pub fn read_legacy(reader: &ContainerReader, options: &ReadOptions) -> Result<DataGraph> {
    LegacyImporter::new(reader, options).import()
}
