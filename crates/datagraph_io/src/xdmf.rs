//! XDMF 2.2 side-car describing every geometry in a graph.
//!
//! The side-car holds no data itself. Heavy data items point into the
//! container at `<file>:/DataStructure/<path>`, so the container must be
//! written from the same graph.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use datagraph_foundation::{ElementType, EntityId, Error, ErrorKind, Result};
use datagraph_storage::{DataGraph, GeometryKind, GeometryRole, Payload};
use tracing::{debug, warn};

use crate::constants::{DATA_STRUCTURE, VERTEX_INDICES};

/// XDMF number type and precision of an element type.
#[must_use]
pub fn number_type(ty: ElementType) -> (&'static str, usize) {
    match ty {
        ElementType::Int8 => ("Char", 1),
        ElementType::Int16 => ("Int", 2),
        ElementType::Int32 => ("Int", 4),
        ElementType::Int64 => ("Int", 8),
        ElementType::UInt8 | ElementType::Bool => ("UChar", 1),
        ElementType::UInt16 => ("UInt", 2),
        ElementType::UInt32 => ("UInt", 4),
        ElementType::UInt64 => ("UInt", 8),
        ElementType::Float32 => ("Float", 4),
        ElementType::Float64 => ("Float", 8),
    }
}

/// XDMF attribute type for a component count; other counts are not described.
fn attribute_type(components: usize) -> Option<&'static str> {
    match components {
        1 | 2 => Some("Scalar"),
        3 | 6 => Some("Vector"),
        9 => Some("Tensor"),
        _ => None,
    }
}

/// Writes the side-car for `graph` to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written or a geometry's metadata
/// cannot be read.
pub fn write_xdmf(path: impl AsRef<Path>, graph: &DataGraph, container_file_name: &str) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        Error::new(ErrorKind::IoError(format!(
            "failed to create file '{}': {e}",
            path.display()
        )))
    })?;
    let mut out = BufWriter::new(file);
    write_xdmf_to(&mut out, graph, container_file_name)?;
    out.flush()?;
    debug!(path = %path.display(), "wrote xdmf side-car");
    Ok(())
}

/// Writes the side-car for `graph` to any sink.
///
/// # Errors
///
/// See [`write_xdmf`].
pub fn write_xdmf_to(out: &mut impl Write, graph: &DataGraph, container_file_name: &str) -> Result<()> {
    let mut xdmf = Xdmf {
        out,
        graph,
        file: container_file_name,
    };
    xdmf.header()?;
    for geometry in graph.geometries() {
        xdmf.geometry(geometry)?;
    }
    xdmf.footer()
}

struct Xdmf<'a, W: Write> {
    out: &'a mut W,
    graph: &'a DataGraph,
    file: &'a str,
}

impl<W: Write> Xdmf<'_, W> {
    fn header(&mut self) -> Result<()> {
        writeln!(self.out, "<?xml version=\"1.0\"?>")?;
        writeln!(self.out, "<!DOCTYPE Xdmf SYSTEM \"Xdmf.dtd\"[]>")?;
        writeln!(self.out, "<Xdmf xmlns:xi=\"http://www.w3.org/2003/XInclude\" Version=\"2.2\">")?;
        writeln!(self.out, " <Domain>")?;
        Ok(())
    }

    fn footer(&mut self) -> Result<()> {
        writeln!(self.out, " </Domain>")?;
        writeln!(self.out, "</Xdmf>")?;
        Ok(())
    }

    /// `<file>:/DataStructure/<first path to id>`.
    fn href(&self, id: EntityId) -> Result<String> {
        let paths = self.graph.paths_to(id)?;
        let path = paths
            .first()
            .ok_or_else(|| Error::invalid_format(format!("{id} is unreachable")))?;
        Ok(format!("{}:/{DATA_STRUCTURE}{path}", self.file))
    }

    fn geometry(&mut self, id: EntityId) -> Result<()> {
        let kind = self.graph.geometry(id)?.kind();
        let name = self.graph.get(id)?.name().to_string();
        let written = match kind {
            GeometryKind::Image => self.image(id, &name)?,
            GeometryKind::RectGrid => self.rect_grid(id, &name)?,
            _ => self.node_geometry(id, &name, kind)?,
        };
        if !written {
            warn!(geometry = %name, %kind, "geometry has nothing to describe; skipped");
            return Ok(());
        }
        let tables: &[(GeometryRole, &str)] = match kind {
            GeometryKind::Image | GeometryKind::RectGrid => &[(GeometryRole::CellData, "Cell")],
            GeometryKind::Vertex => &[(GeometryRole::VertexData, "Node")],
            GeometryKind::Edge => &[(GeometryRole::VertexData, "Node"), (GeometryRole::EdgeData, "Cell")],
            GeometryKind::Triangle | GeometryKind::Quad => &[
                (GeometryRole::VertexData, "Node"),
                (GeometryRole::EdgeData, "Cell"),
                (GeometryRole::FaceData, "Cell"),
            ],
            GeometryKind::Tetrahedral | GeometryKind::Hexahedral => &[
                (GeometryRole::VertexData, "Node"),
                (GeometryRole::EdgeData, "Cell"),
                (GeometryRole::FaceData, "Cell"),
                (GeometryRole::PolyhedronData, "Cell"),
            ],
        };
        for &(role, center) in tables {
            if let Some(table) = self.graph.geometry_reference(id, role)? {
                self.attribute_table(table, center)?;
            }
        }
        writeln!(self.out, "  </Grid>")?;
        writeln!(self.out, "  <!-- *************** END OF {name} *************** -->")?;
        Ok(())
    }

    fn grid_header(&mut self, name: &str) -> Result<()> {
        writeln!(self.out, "  <!-- *************** START OF {name} *************** -->")?;
        writeln!(self.out, "  <Grid Name=\"{name}\" GridType=\"Uniform\">")?;
        Ok(())
    }

    fn image(&mut self, id: EntityId, name: &str) -> Result<bool> {
        let Some(grid) = self.graph.geometry(id)?.grid().copied() else {
            return Ok(false);
        };
        let [x, y, z] = grid.dimensions;
        let [ox, oy, oz] = grid.origin;
        let [sx, sy, sz] = grid.spacing;
        self.grid_header(name)?;
        writeln!(
            self.out,
            "    <Topology TopologyType=\"3DCoRectMesh\" Dimensions=\"{} {} {} \"></Topology>",
            z + 1,
            y + 1,
            x + 1
        )?;
        writeln!(self.out, "    <Geometry Type=\"ORIGIN_DXDYDZ\">")?;
        writeln!(self.out, "      <!-- Origin  Z, Y, X -->")?;
        writeln!(self.out, "      <DataItem Format=\"XML\" Dimensions=\"3\">{oz} {oy} {ox}</DataItem>")?;
        writeln!(self.out, "      <!-- DxDyDz (Spacing/Spacing) Z, Y, X -->")?;
        writeln!(self.out, "      <DataItem Format=\"XML\" Dimensions=\"3\">{sz} {sy} {sx}</DataItem>")?;
        writeln!(self.out, "    </Geometry>")?;
        Ok(true)
    }

    fn rect_grid(&mut self, id: EntityId, name: &str) -> Result<bool> {
        let mut bounds = Vec::with_capacity(3);
        for role in [GeometryRole::XBounds, GeometryRole::YBounds, GeometryRole::ZBounds] {
            let Some(array) = self.graph.geometry_reference(id, role)? else {
                return Ok(false);
            };
            bounds.push((self.graph.array(array)?.num_tuples(), self.href(array)?));
        }
        self.grid_header(name)?;
        writeln!(
            self.out,
            "    <Topology TopologyType=\"3DRectMesh\" Dimensions=\"{} {} {} \"></Topology>",
            bounds[2].0, bounds[1].0, bounds[0].0
        )?;
        writeln!(self.out, "    <Geometry Type=\"VxVyVz\">")?;
        for (count, href) in &bounds {
            writeln!(
                self.out,
                "    <DataItem Format=\"HDF\" Dimensions=\"{count}\" NumberType=\"Float\" Precision=\"4\">"
            )?;
            writeln!(self.out, "      {href}")?;
            writeln!(self.out, "    </DataItem>")?;
        }
        writeln!(self.out, "    </Geometry>")?;
        Ok(true)
    }

    fn node_geometry(&mut self, id: EntityId, name: &str, kind: GeometryKind) -> Result<bool> {
        let Some(vertices) = self.graph.geometry_reference(id, GeometryRole::SharedVertices)? else {
            return Ok(false);
        };
        let num_verts = self.graph.array(vertices)?.num_tuples();
        let num_cells = self.graph.number_of_cells(id)?;
        if num_verts == 0 || num_cells == 0 {
            return Ok(false);
        }
        let vertices_href = self.href(vertices)?;

        self.grid_header(name)?;
        if kind == GeometryKind::Vertex {
            let indices = format!("{}/{VERTEX_INDICES}", self.href(id)?);
            writeln!(
                self.out,
                "    <Topology TopologyType=\"Polyvertex\" NumberOfElements=\"{num_verts}\">"
            )?;
            writeln!(
                self.out,
                "      <DataItem Format=\"HDF\" NumberType=\"Int\" Dimensions=\"{num_verts}\">"
            )?;
            writeln!(self.out, "        {indices}")?;
        } else {
            let (topology, nodes) = match kind {
                GeometryKind::Edge => ("Polyline", 2),
                GeometryKind::Triangle => ("Triangle", 3),
                GeometryKind::Quad => ("Quadrilateral", 4),
                GeometryKind::Tetrahedral => ("Tetrahedron", 4),
                _ => ("Hexahedron", 8),
            };
            let Some(role) = kind.connectivity_role() else {
                return Err(Error::missing_reference(id, "connectivity"));
            };
            let cells = self
                .graph
                .geometry_reference(id, role)?
                .ok_or_else(|| Error::missing_reference(id, role.label()))?;
            if kind == GeometryKind::Edge {
                writeln!(
                    self.out,
                    "    <Topology TopologyType=\"{topology}\" NodesPerElement=\"{nodes}\" NumberOfElements=\"{num_cells}\">"
                )?;
            } else {
                writeln!(
                    self.out,
                    "    <Topology TopologyType=\"{topology}\" NumberOfElements=\"{num_cells}\">"
                )?;
            }
            writeln!(
                self.out,
                "      <DataItem Format=\"HDF\" NumberType=\"Int\" Dimensions=\"{num_cells} {nodes}\">"
            )?;
            writeln!(self.out, "        {}", self.href(cells)?)?;
        }
        writeln!(self.out, "      </DataItem>")?;
        writeln!(self.out, "    </Topology>")?;
        writeln!(self.out, "    <Geometry Type=\"XYZ\">")?;
        writeln!(
            self.out,
            "      <DataItem Format=\"HDF\"  Dimensions=\"{num_verts} 3\" NumberType=\"Float\" Precision=\"4\">"
        )?;
        writeln!(self.out, "        {vertices_href}")?;
        writeln!(self.out, "      </DataItem>")?;
        writeln!(self.out, "    </Geometry>")?;
        writeln!(self.out)?;
        Ok(true)
    }

    fn attribute_table(&mut self, table: EntityId, center: &str) -> Result<()> {
        let graph = self.graph;
        for &child in graph.child_map(table)?.values() {
            let entity = graph.get(child)?;
            let Payload::Array(array) = entity.payload() else {
                continue;
            };
            let components = array.num_components();
            let Some(attr_type) = attribute_type(components) else {
                continue;
            };
            let (number, precision) = number_type(array.element_type());
            let mut tuple_dims = array.tuple_shape();
            tuple_dims.reverse();
            let tuples = tuple_dims
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            let item = Item {
                name: entity.name(),
                attr_type,
                center,
                dims: format!("{tuples} {components}"),
                half: format!("{tuples} {}", components / 2),
                number,
                precision,
                href: self.href(child)?,
            };
            if matches!(components, 2 | 6) {
                self.slab(&item, 0)?;
                writeln!(self.out)?;
                self.slab(&item, components / 2)?;
            } else {
                self.plain(&item)?;
            }
        }
        Ok(())
    }

    fn plain(&mut self, item: &Item<'_>) -> Result<()> {
        writeln!(
            self.out,
            "    <Attribute Name=\"{}\" AttributeType=\"{}\" Center=\"{}\">",
            item.name, item.attr_type, item.center
        )?;
        writeln!(
            self.out,
            "      <DataItem Format=\"HDF\" Dimensions=\"{}\" NumberType=\"{}\" Precision=\"{}\" >",
            item.dims, item.number, item.precision
        )?;
        writeln!(self.out, "        {}", item.href)?;
        writeln!(self.out, "      </DataItem>")?;
        writeln!(self.out, "    </Attribute>")?;
        Ok(())
    }

    /// One half of a two-sided array, selected with a hyperslab.
    fn slab(&mut self, item: &Item<'_>, start: usize) -> Result<()> {
        let feature = usize::from(start != 0);
        let label = format!("{} (Feature {feature})", item.name);
        writeln!(
            self.out,
            "    <Attribute Name=\"{label}\" AttributeType=\"{}\" Center=\"{}\">",
            item.attr_type, item.center
        )?;
        writeln!(
            self.out,
            "      <DataItem ItemType=\"HyperSlab\" Dimensions=\"{}\" Type=\"HyperSlab\" Name=\"{label}\" >",
            item.half
        )?;
        writeln!(self.out, "        <DataItem Dimensions=\"3 2\" Format=\"XML\" >")?;
        writeln!(self.out, "          0        {start}")?;
        writeln!(self.out, "          1        1")?;
        writeln!(self.out, "          {} </DataItem>", item.half)?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "        <DataItem Format=\"HDF\" Dimensions=\"{}\" NumberType=\"{}\" Precision=\"{}\" >",
            item.dims, item.number, item.precision
        )?;
        writeln!(self.out, "        {}", item.href)?;
        writeln!(self.out, "        </DataItem>")?;
        writeln!(self.out, "      </DataItem>")?;
        writeln!(self.out, "    </Attribute>")?;
        Ok(())
    }
}

struct Item<'a> {
    name: &'a str,
    attr_type: &'static str,
    center: &'a str,
    dims: String,
    half: String,
    number: &'static str,
    precision: usize,
    href: String,
}
