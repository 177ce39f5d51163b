//! Names and version tags shared by the writer, the readers, and the XDMF
//! exporter.

#![allow(missing_docs)]

/// Root attribute holding the layout version.
pub const FILE_VERSION: &str = "FileVersion";
/// Version tag of the current layout.
pub const CURRENT_VERSION: &str = "8.0";
/// Version tag of the legacy layout.
pub const LEGACY_VERSION: &str = "7.0";

/// Group holding the serialized graph.
pub const DATA_STRUCTURE: &str = "DataStructure";
/// Attribute on [`DATA_STRUCTURE`] recording the id counter.
pub const NEXT_OBJECT_ID: &str = "NextObjectId";

pub const OBJECT_TYPE: &str = "ObjectType";
pub const OBJECT_ID: &str = "ObjectId";
pub const IMPORTABLE: &str = "Importable";
pub const TUPLE_SHAPE: &str = "TupleShape";
pub const COMPONENT_SHAPE: &str = "ComponentShape";
pub const TUPLE_DIMENSIONS: &str = "TupleDimensions";

/// Attribute on a list dataset naming its row-length companion.
pub const LINKED_NUM_NEIGHBORS: &str = "Linked NumNeighbors Dataset";
/// Suffix appended to a list's name to form its companion's name.
pub const NUM_NEIGHBORS_SUFFIX: &str = "_NumNeighbors";

pub const SPATIAL_DIMENSIONALITY: &str = "SpatialDimensionality";
pub const UNIT_DIMENSIONALITY: &str = "UnitDimensionality";
pub const GRID_DIMENSIONS: &str = "_DIMENSIONS";
pub const GRID_ORIGIN: &str = "_ORIGIN";
pub const GRID_SPACING: &str = "_SPACING";

/// Non-importable per-vertex index dataset emitted under vertex geometries.
pub const VERTEX_INDICES: &str = "_VertexIndices";

/// Names used by the legacy layout.
pub mod legacy {
    pub const DATA_CONTAINERS: &str = "DataContainers";
    pub const GEOMETRY_GROUP: &str = "_SIMPL_GEOMETRY";
    pub const GEOMETRY_TYPE_NAME: &str = "GeometryTypeName";
    pub const COMPONENT_DIMENSIONS: &str = "ComponentDimensions";
    pub const ATTRIBUTE_MATRIX_TYPE: &str = "AttributeMatrixType";
    pub const STRING_ARRAY: &str = "StringDataArray";
    pub const BOOL_ARRAY: &str = "DataArray<bool>";

    pub const SHARED_VERTEX_LIST: &str = "SharedVertexList";
    pub const SHARED_EDGE_LIST: &str = "SharedEdgeList";
    pub const SHARED_TRI_LIST: &str = "SharedTriList";
    pub const SHARED_QUAD_LIST: &str = "SharedQuadList";
    pub const SHARED_TET_LIST: &str = "SharedTetList";
    pub const SHARED_HEX_LIST: &str = "SharedHexList";
    pub const X_BOUNDS: &str = "xBounds";
    pub const Y_BOUNDS: &str = "yBounds";
    pub const Z_BOUNDS: &str = "zBounds";
    pub const DIMENSIONS: &str = "DIMENSIONS";
    pub const ORIGIN: &str = "ORIGIN";
    pub const SPACING: &str = "SPACING";

    pub const VERTEX_MATRIX: u64 = 0;
    pub const EDGE_MATRIX: u64 = 1;
    pub const FACE_MATRIX: u64 = 2;
    pub const CELL_MATRIX: u64 = 3;
}
