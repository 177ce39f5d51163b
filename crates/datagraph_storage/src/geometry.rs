//! Geometries: composites that reference vertex lists, connectivity arrays,
//! and attribute tables by id.
//!
//! A geometry never owns what it references. References are plain ids, so
//! removing a referenced entity leaves a dangling id that fails with
//! [`ErrorKind::DanglingReference`](datagraph_foundation::ErrorKind) on the
//! next access through [`DataGraph::geometry_reference`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use datagraph_foundation::{EntityId, Error, ErrorKind, Result};
use tracing::debug;

use crate::entity::{EntityKind, Payload};
use crate::graph::DataGraph;
use crate::list::ListStore;
use crate::typed::{TypedArray, TypedList};

/// The closed set of geometry variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeometryKind {
    /// Regular grid described by dimensions, origin, and spacing.
    Image,
    /// Rectilinear grid described by per-axis bounds arrays.
    RectGrid,
    /// Point cloud.
    Vertex,
    /// Line segments.
    Edge,
    /// Triangle surface mesh.
    Triangle,
    /// Quadrilateral surface mesh.
    Quad,
    /// Tetrahedral volume mesh.
    Tetrahedral,
    /// Hexahedral volume mesh.
    Hexahedral,
}

impl GeometryKind {
    /// Every geometry kind.
    pub const ALL: [Self; 8] = [
        Self::Image,
        Self::RectGrid,
        Self::Vertex,
        Self::Edge,
        Self::Triangle,
        Self::Quad,
        Self::Tetrahedral,
        Self::Hexahedral,
    ];

    /// The type name recorded in containers.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Image => "ImageGeom",
            Self::RectGrid => "RectGridGeom",
            Self::Vertex => "VertexGeom",
            Self::Edge => "EdgeGeom",
            Self::Triangle => "TriangleGeom",
            Self::Quad => "QuadGeom",
            Self::Tetrahedral => "TetrahedralGeom",
            Self::Hexahedral => "HexahedralGeom",
        }
    }

    /// Parses a type name.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }

    /// The element name used when naming derived entities.
    #[must_use]
    pub const fn element_name(self) -> &'static str {
        match self {
            Self::Image | Self::RectGrid => "Cell",
            Self::Vertex => "Vertex",
            Self::Edge => "Edge",
            Self::Triangle => "Triangle",
            Self::Quad => "Quad",
            Self::Tetrahedral => "Tet",
            Self::Hexahedral => "Hex",
        }
    }

    /// Returns true for the grid kinds, whose cells are implicit.
    #[must_use]
    pub const fn is_grid(self) -> bool {
        matches!(self, Self::Image | Self::RectGrid)
    }

    /// The role holding this kind's cell connectivity, if it has one.
    #[must_use]
    pub const fn connectivity_role(self) -> Option<GeometryRole> {
        match self {
            Self::Edge => Some(GeometryRole::SharedEdges),
            Self::Triangle | Self::Quad => Some(GeometryRole::SharedFaces),
            Self::Tetrahedral | Self::Hexahedral => Some(GeometryRole::SharedPolyhedra),
            Self::Image | Self::RectGrid | Self::Vertex => None,
        }
    }

    /// The attribute table role whose tuples are this kind's cells.
    #[must_use]
    pub const fn cell_data_role(self) -> GeometryRole {
        match self {
            Self::Image | Self::RectGrid => GeometryRole::CellData,
            Self::Vertex => GeometryRole::VertexData,
            Self::Edge => GeometryRole::EdgeData,
            Self::Triangle | Self::Quad => GeometryRole::FaceData,
            Self::Tetrahedral | Self::Hexahedral => GeometryRole::PolyhedronData,
        }
    }

    /// Minimum number of shared vertices for two cells to be neighbors.
    const fn shared_vertex_threshold(self) -> usize {
        match self {
            Self::Edge => 1,
            Self::Triangle | Self::Quad => 2,
            Self::Tetrahedral => 3,
            Self::Hexahedral => 4,
            Self::Image | Self::RectGrid | Self::Vertex => 0,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Per-kind behavior that needs no graph access.
pub trait GeometryCapabilities {
    /// Vertices per cell (8 for grid voxels).
    fn vertices_per_cell(&self) -> usize;

    /// Topological dimension of a cell.
    fn unit_dimensionality(&self) -> u32;

    /// Parametric coordinates of the cell center.
    fn parametric_center(&self) -> [f64; 3];

    /// Derivatives of the cell's shape functions at `pcoords`, grouped by
    /// parametric direction (all r-derivatives, then s, then t).
    fn shape_functions(&self, pcoords: [f64; 3]) -> Vec<f64>;
}

fn hex_derivatives([r, s, t]: [f64; 3]) -> Vec<f64> {
    let rm = 1.0 - r;
    let sm = 1.0 - s;
    let tm = 1.0 - t;
    vec![
        -sm * tm,
        sm * tm,
        s * tm,
        -s * tm,
        -sm * t,
        sm * t,
        s * t,
        -s * t,
        -rm * tm,
        -r * tm,
        r * tm,
        rm * tm,
        -rm * t,
        -r * t,
        r * t,
        rm * t,
        -rm * sm,
        -r * sm,
        -r * s,
        -rm * s,
        rm * sm,
        r * sm,
        r * s,
        rm * s,
    ]
}

impl GeometryCapabilities for GeometryKind {
    fn vertices_per_cell(&self) -> usize {
        match self {
            Self::Vertex => 1,
            Self::Edge => 2,
            Self::Triangle => 3,
            Self::Quad | Self::Tetrahedral => 4,
            Self::Hexahedral | Self::Image | Self::RectGrid => 8,
        }
    }

    fn unit_dimensionality(&self) -> u32 {
        match self {
            Self::Vertex => 0,
            Self::Edge => 1,
            Self::Triangle | Self::Quad => 2,
            Self::Tetrahedral | Self::Hexahedral | Self::Image | Self::RectGrid => 3,
        }
    }

    fn parametric_center(&self) -> [f64; 3] {
        match self {
            Self::Vertex => [0.0, 0.0, 0.0],
            Self::Edge => [0.5, 0.0, 0.0],
            Self::Triangle => [1.0 / 3.0, 1.0 / 3.0, 0.0],
            Self::Quad => [0.5, 0.5, 0.0],
            Self::Tetrahedral => [0.25, 0.25, 0.25],
            Self::Hexahedral | Self::Image | Self::RectGrid => [0.5, 0.5, 0.5],
        }
    }

    fn shape_functions(&self, pcoords: [f64; 3]) -> Vec<f64> {
        let [r, s, _] = pcoords;
        match self {
            Self::Vertex => vec![0.0, 0.0, 0.0],
            Self::Edge => vec![-1.0, 1.0],
            Self::Triangle => vec![-1.0, 1.0, 0.0, -1.0, 0.0, 1.0],
            Self::Quad => {
                let rm = 1.0 - r;
                let sm = 1.0 - s;
                vec![-sm, sm, s, -s, -rm, -r, r, rm]
            }
            Self::Tetrahedral => vec![
                -1.0, 1.0, 0.0, 0.0, //
                -1.0, 0.0, 1.0, 0.0, //
                -1.0, 0.0, 0.0, 1.0,
            ],
            Self::Hexahedral | Self::Image | Self::RectGrid => hex_derivatives(pcoords),
        }
    }
}

/// A slot through which a geometry references another entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeometryRole {
    /// Vertex coordinates (float32, 3 components).
    SharedVertices,
    /// Edge connectivity.
    SharedEdges,
    /// Triangle or quad connectivity.
    SharedFaces,
    /// Tetrahedron or hexahedron connectivity.
    SharedPolyhedra,
    /// Attribute table over vertices.
    VertexData,
    /// Attribute table over edges.
    EdgeData,
    /// Attribute table over faces.
    FaceData,
    /// Attribute table over polyhedra.
    PolyhedronData,
    /// Attribute table over grid cells.
    CellData,
    /// Rectilinear grid bounds along x.
    XBounds,
    /// Rectilinear grid bounds along y.
    YBounds,
    /// Rectilinear grid bounds along z.
    ZBounds,
    /// Per-element sizes.
    ElementSizes,
    /// Per-element neighbor lists.
    ElementNeighbors,
    /// Per-vertex lists of containing elements.
    ElementsContainingVert,
    /// Per-element centroids.
    ElementCentroids,
}

impl GeometryRole {
    /// Every role.
    pub const ALL: [Self; 16] = [
        Self::SharedVertices,
        Self::SharedEdges,
        Self::SharedFaces,
        Self::SharedPolyhedra,
        Self::VertexData,
        Self::EdgeData,
        Self::FaceData,
        Self::PolyhedronData,
        Self::CellData,
        Self::XBounds,
        Self::YBounds,
        Self::ZBounds,
        Self::ElementSizes,
        Self::ElementNeighbors,
        Self::ElementsContainingVert,
        Self::ElementCentroids,
    ];

    /// Attribute name under which the reference id is stored.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::SharedVertices => "SharedVertexListID",
            Self::SharedEdges => "SharedEdgeListID",
            Self::SharedFaces => "SharedFaceListID",
            Self::SharedPolyhedra => "SharedPolyhedronListID",
            Self::VertexData => "VertexDataID",
            Self::EdgeData => "EdgeDataID",
            Self::FaceData => "FaceDataID",
            Self::PolyhedronData => "PolyhedronDataID",
            Self::CellData => "CellDataID",
            Self::XBounds => "XBoundsID",
            Self::YBounds => "YBoundsID",
            Self::ZBounds => "ZBoundsID",
            Self::ElementSizes => "ElementSizesID",
            Self::ElementNeighbors => "ElementNeighborsID",
            Self::ElementsContainingVert => "ElementsContainingVertID",
            Self::ElementCentroids => "ElementCentroidsID",
        }
    }

    /// Human-readable role name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SharedVertices => "shared vertex list",
            Self::SharedEdges => "shared edge list",
            Self::SharedFaces => "shared face list",
            Self::SharedPolyhedra => "shared polyhedron list",
            Self::VertexData => "vertex data",
            Self::EdgeData => "edge data",
            Self::FaceData => "face data",
            Self::PolyhedronData => "polyhedron data",
            Self::CellData => "cell data",
            Self::XBounds => "x bounds",
            Self::YBounds => "y bounds",
            Self::ZBounds => "z bounds",
            Self::ElementSizes => "element sizes",
            Self::ElementNeighbors => "element neighbors",
            Self::ElementsContainingVert => "elements containing vertex",
            Self::ElementCentroids => "element centroids",
        }
    }
}

/// Dimensions, origin, and spacing of a regular grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSpec {
    /// Cell counts along x, y, z.
    pub dimensions: [usize; 3],
    /// Origin along x, y, z.
    pub origin: [f32; 3],
    /// Spacing along x, y, z.
    pub spacing: [f32; 3],
}

impl GridSpec {
    /// Creates a grid with unit spacing at the origin.
    #[must_use]
    pub fn with_dimensions(dimensions: [usize; 3]) -> Self {
        Self {
            dimensions,
            origin: [0.0; 3],
            spacing: [1.0; 3],
        }
    }

    /// Number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// Tuple shape of a cell attribute table, slowest axis first (z, y, x).
    #[must_use]
    pub fn cell_tuple_shape(&self) -> Vec<usize> {
        let [x, y, z] = self.dimensions;
        vec![z, y, x]
    }
}

/// A geometry composite.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    kind: GeometryKind,
    spatial_dimensionality: u32,
    unit_dimensionality: u32,
    grid: Option<GridSpec>,
    references: BTreeMap<GeometryRole, EntityId>,
}

impl Geometry {
    /// Creates a geometry with no references.
    #[must_use]
    pub fn new(kind: GeometryKind) -> Self {
        Self {
            kind,
            spatial_dimensionality: 3,
            unit_dimensionality: kind.unit_dimensionality(),
            grid: None,
            references: BTreeMap::new(),
        }
    }

    /// Creates an image geometry.
    #[must_use]
    pub fn image(grid: GridSpec) -> Self {
        Self::new(GeometryKind::Image).with_grid(grid)
    }

    /// Sets the grid description.
    #[must_use]
    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Sets a reference.
    #[must_use]
    pub fn with_reference(mut self, role: GeometryRole, id: EntityId) -> Self {
        self.references.insert(role, id);
        self
    }

    /// Sets the spatial and unit dimensionality.
    #[must_use]
    pub fn with_dimensionality(mut self, spatial: u32, unit: u32) -> Self {
        self.spatial_dimensionality = spatial;
        self.unit_dimensionality = unit;
        self
    }

    /// The geometry kind.
    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Spatial dimensionality of the embedding space.
    #[must_use]
    pub fn spatial_dimensionality(&self) -> u32 {
        self.spatial_dimensionality
    }

    /// Topological dimensionality of the cells.
    #[must_use]
    pub fn unit_dimensionality(&self) -> u32 {
        self.unit_dimensionality
    }

    /// The grid description, for grid kinds.
    #[must_use]
    pub fn grid(&self) -> Option<&GridSpec> {
        self.grid.as_ref()
    }

    /// Replaces the grid description.
    pub fn set_grid(&mut self, grid: Option<GridSpec>) {
        self.grid = grid;
    }

    /// The raw id stored for `role`, without checking liveness.
    #[must_use]
    pub fn reference(&self, role: GeometryRole) -> Option<EntityId> {
        self.references.get(&role).copied()
    }

    /// Sets or clears the id stored for `role`.
    pub fn set_reference(&mut self, role: GeometryRole, id: Option<EntityId>) {
        match id {
            Some(id) => self.references.insert(role, id),
            None => self.references.remove(&role),
        };
    }

    /// All references, in role order.
    pub fn references(&self) -> impl Iterator<Item = (GeometryRole, EntityId)> + '_ {
        self.references.iter().map(|(role, id)| (*role, *id))
    }
}

impl DataGraph {
    /// Resolves a geometry reference, checking that its target still exists.
    ///
    /// # Errors
    ///
    /// Returns an error if `geometry` is not a geometry or the referenced
    /// entity was removed.
    pub fn geometry_reference(&self, geometry: EntityId, role: GeometryRole) -> Result<Option<EntityId>> {
        let geom = self.geometry(geometry)?;
        match geom.reference(role) {
            Some(target) if !self.contains(target) => {
                Err(Error::dangling_reference(geometry, role.label(), target))
            }
            other => Ok(other),
        }
    }

    /// Resolves a reference that must be set and must name an array.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is unset, dangling, or not an array.
    pub fn geometry_array(&self, geometry: EntityId, role: GeometryRole) -> Result<Arc<TypedArray>> {
        let target = self
            .geometry_reference(geometry, role)?
            .ok_or_else(|| Error::missing_reference(geometry, role.label()))?;
        self.array(target).cloned()
    }

    /// Number of vertices of a node-based geometry.
    ///
    /// # Errors
    ///
    /// Returns an error for grid geometries or if the vertex list is missing.
    pub fn number_of_vertices(&self, geometry: EntityId) -> Result<usize> {
        let kind = self.geometry(geometry)?.kind();
        if kind.is_grid() {
            return Err(Error::new(ErrorKind::Unsupported(format!(
                "{kind} has no shared vertex list"
            ))));
        }
        Ok(self.geometry_array(geometry, GeometryRole::SharedVertices)?.num_tuples())
    }

    /// Number of cells of a geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if a required reference is missing or dangling.
    pub fn number_of_cells(&self, geometry: EntityId) -> Result<usize> {
        let geom = self.geometry(geometry)?;
        match geom.kind() {
            GeometryKind::Image => geom
                .grid()
                .map(GridSpec::cell_count)
                .ok_or_else(|| Error::missing_reference(geometry, "grid dimensions")),
            GeometryKind::RectGrid => {
                let mut cells = 1;
                for role in [GeometryRole::XBounds, GeometryRole::YBounds, GeometryRole::ZBounds] {
                    let bounds = self.geometry_array(geometry, role)?.num_tuples();
                    cells *= bounds.saturating_sub(1);
                }
                Ok(cells)
            }
            GeometryKind::Vertex => self.number_of_vertices(geometry),
            kind => {
                let role = kind
                    .connectivity_role()
                    .ok_or_else(|| Error::missing_reference(geometry, "connectivity"))?;
                Ok(self.geometry_array(geometry, role)?.num_tuples())
            }
        }
    }

    fn cell_connectivity(&self, geometry: EntityId) -> Result<(GeometryKind, Vec<Vec<usize>>)> {
        let kind = self.geometry(geometry)?.kind();
        let role = kind.connectivity_role().ok_or_else(|| {
            Error::new(ErrorKind::Unsupported(format!("{kind} has no cell connectivity")))
        })?;
        let cells = self.geometry_array(geometry, role)?;
        let width = cells.num_components();
        let flat = cells.to_indices()?;
        Ok((kind, flat.chunks(width.max(1)).map(<[usize]>::to_vec).collect()))
    }

    fn replace_derived_list(
        &mut self,
        geometry: EntityId,
        role: GeometryRole,
        name: &str,
        rows: &[Vec<u64>],
    ) -> Result<EntityId> {
        if let Some(old) = self.geometry(geometry)?.reference(role) {
            if self.contains(old) {
                self.remove(old)?;
            }
        }
        if let Some(existing) = self.child(geometry, name) {
            self.remove(existing)?;
        }
        let store = ListStore::from_rows(vec![rows.len()], rows)?;
        let id = self.create(geometry, name, Payload::List(Arc::new(TypedList::from(store))))?;
        self.geometry_mut(geometry)?.set_reference(role, Some(id));
        Ok(id)
    }

    /// Builds, for every vertex, the list of cells that use it.
    ///
    /// The list is stored as a child of the geometry and recorded under
    /// [`GeometryRole::ElementsContainingVert`], replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error for grid and vertex geometries or if the vertex or
    /// connectivity arrays are missing.
    pub fn find_elements_containing_vert(&mut self, geometry: EntityId) -> Result<EntityId> {
        let (kind, cells) = self.cell_connectivity(geometry)?;
        let vertex_count = self.number_of_vertices(geometry)?;
        let mut rows = vec![Vec::new(); vertex_count];
        for (cell, verts) in cells.iter().enumerate() {
            for &v in verts {
                let row = rows
                    .get_mut(v)
                    .ok_or_else(|| Error::out_of_range(v, vertex_count))?;
                row.push(cell as u64);
            }
        }
        debug!(%geometry, vertices = vertex_count, cells = cells.len(), "found elements containing vertices");
        let name = format!("{} Containing Vertices", kind.element_name());
        self.replace_derived_list(geometry, GeometryRole::ElementsContainingVert, &name, &rows)
    }

    /// Builds, for every cell, the list of cells sharing a boundary with it.
    ///
    /// Two cells are neighbors when they share an edge endpoint (edges), an
    /// edge (triangles, quads), or a face (tetrahedra, hexahedra).
    ///
    /// # Errors
    ///
    /// Returns an error for grid and vertex geometries or if the required
    /// arrays are missing.
    pub fn find_element_neighbors(&mut self, geometry: EntityId) -> Result<EntityId> {
        let (kind, cells) = self.cell_connectivity(geometry)?;
        let containing = match self.geometry_reference(geometry, GeometryRole::ElementsContainingVert)? {
            Some(id) => id,
            None => self.find_elements_containing_vert(geometry)?,
        };
        let containing = self.list(containing)?.as_store::<u64>()?.to_rows();

        let threshold = kind.shared_vertex_threshold();
        let mut rows = Vec::with_capacity(cells.len());
        for (cell, verts) in cells.iter().enumerate() {
            let mut shared: BTreeMap<u64, usize> = BTreeMap::new();
            for &v in verts {
                for &other in containing.get(v).into_iter().flatten() {
                    if other != cell as u64 {
                        *shared.entry(other).or_default() += 1;
                    }
                }
            }
            rows.push(
                shared
                    .into_iter()
                    .filter(|&(_, count)| count >= threshold)
                    .map(|(other, _)| other)
                    .collect::<Vec<_>>(),
            );
        }
        let name = format!("{} Neighbors", kind.element_name());
        self.replace_derived_list(geometry, GeometryRole::ElementNeighbors, &name, &rows)
    }

    /// Checks that every reference is live and that attribute tables bound to
    /// the geometry have matching tuple counts.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate_geometry(&self, geometry: EntityId) -> Result<()> {
        let geom = self.geometry(geometry)?;
        for (role, target) in geom.references() {
            if !self.contains(target) {
                return Err(Error::dangling_reference(geometry, role.label(), target));
            }
        }
        let kind = geom.kind();
        if let Some(table) = geom.reference(kind.cell_data_role()) {
            let expected = self.number_of_cells(geometry)?;
            let actual = self.attribute_table(table)?.num_tuples();
            if expected != actual {
                return Err(Error::shape_mismatch(&[expected], &[actual]).at_object(format!("{geometry}")));
            }
        }
        if !kind.is_grid() && kind != GeometryKind::Vertex {
            if let Some(table) = geom.reference(GeometryRole::VertexData) {
                let expected = self.number_of_vertices(geometry)?;
                let actual = self.attribute_table(table)?.num_tuples();
                if expected != actual {
                    return Err(Error::shape_mismatch(&[expected], &[actual]).at_object(format!("{geometry}")));
                }
            }
        }
        Ok(())
    }

    /// Ids of every geometry in the graph, ascending.
    #[must_use]
    pub fn geometries(&self) -> Vec<EntityId> {
        self.ids()
            .into_iter()
            .filter(|id| matches!(self.kind(*id), Some(EntityKind::Geometry(_))))
            .collect()
    }
}
