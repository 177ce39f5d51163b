//! Streaming container writer.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use datagraph_foundation::{ChunkGrid, ElementType, Error, ErrorKind, Result, shape_len, validate_name};
use tracing::debug;

use crate::format::{
    AttributeValue, DataType, DatasetNode, Extent, GroupNode, HEADER_LEN, Index, Layout, MAGIC, Node, ObjectRef,
    REVISION, encode_strings,
};

/// Writes a container: payloads stream out as datasets are added, the index
/// follows on [`ContainerWriter::finish`].
///
/// A writer that is dropped without `finish` leaves a file with a zeroed
/// index pointer, which readers reject.
#[derive(Debug)]
pub struct ContainerWriter<W: Write + Seek> {
    out: W,
    position: u64,
    index: Index,
}

impl ContainerWriter<BufWriter<File>> {
    /// Creates (or truncates) a container file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to create file '{}': {e}",
                path.display()
            )))
        })?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write + Seek> ContainerWriter<W> {
    /// Starts a container on `out`, which must be positioned at its start.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(mut out: W) -> Result<Self> {
        out.write_all(&MAGIC)?;
        out.write_all(&REVISION.to_le_bytes())?;
        out.write_all(&[0u8; 16])?;
        Ok(Self {
            out,
            position: HEADER_LEN,
            index: Index::new(),
        })
    }

    /// The root group.
    #[must_use]
    pub fn root(&self) -> ObjectRef {
        ObjectRef::ROOT
    }

    /// Returns the child of `group` named `name`, if any.
    #[must_use]
    pub fn child(&self, group: ObjectRef, name: &str) -> Option<ObjectRef> {
        self.index.group(group).ok()?.links.get(name).copied()
    }

    fn add_node(&mut self, parent: ObjectRef, name: &str, node: Node) -> Result<ObjectRef> {
        validate_name(name)?;
        if self.index.group(parent)?.links.contains_key(name) {
            return Err(link_exists(name));
        }
        let object = ObjectRef(self.index.objects.len());
        self.index.objects.push(node);
        self.index.group_mut(parent)?.links.insert(name.to_string(), object);
        Ok(object)
    }

    fn append(&mut self, bytes: &[u8]) -> Result<Extent> {
        self.out.write_all(bytes)?;
        let extent = Extent {
            offset: self.position,
            len: bytes.len() as u64,
        };
        self.position += extent.len;
        Ok(extent)
    }

    /// Creates an empty group under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is not a group or the name is taken.
    pub fn create_group(&mut self, parent: ObjectRef, name: &str) -> Result<ObjectRef> {
        self.add_node(parent, name, Node::Group(GroupNode::default()))
    }

    /// Sets an attribute on a group or dataset, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if `object` does not exist.
    pub fn set_attribute(&mut self, object: ObjectRef, name: &str, value: impl Into<AttributeValue>) -> Result<()> {
        self.index
            .node_mut(object)?
            .attributes_mut()
            .insert(name.to_string(), value.into());
        Ok(())
    }

    /// Writes a contiguous numeric dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte count does not match `shape` and `ty`,
    /// or the name is taken.
    pub fn write_dataset(
        &mut self,
        parent: ObjectRef,
        name: &str,
        ty: ElementType,
        shape: &[usize],
        bytes: &[u8],
    ) -> Result<ObjectRef> {
        let expected = shape_len(shape) * ty.size();
        if bytes.len() != expected {
            return Err(Error::shape_mismatch(&[expected], &[bytes.len()]).at_object(name));
        }
        self.index.group(parent)?;
        let extent = self.append(bytes)?;
        self.add_node(
            parent,
            name,
            Node::Dataset(DatasetNode {
                attributes: Default::default(),
                dtype: DataType::Element(ty),
                shape: shape.to_vec(),
                layout: Layout::Contiguous(extent),
            }),
        )
    }

    /// Writes a chunked numeric dataset.
    ///
    /// `chunk_shape` partitions the leading `chunk_shape.len()` dimensions of
    /// `shape`; the remaining dimensions are stored whole in every chunk.
    /// `chunk(i)` must return the bytes of chunk `i` in row-major order over
    /// the chunk's clipped extent.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk shape does not fit `shape`, a chunk has
    /// the wrong size, or `chunk` fails.
    pub fn write_chunked_dataset(
        &mut self,
        parent: ObjectRef,
        name: &str,
        ty: ElementType,
        shape: &[usize],
        chunk_shape: &[usize],
        mut chunk: impl FnMut(usize) -> Result<Vec<u8>>,
    ) -> Result<ObjectRef> {
        if chunk_shape.len() > shape.len() {
            return Err(Error::shape_mismatch(shape, chunk_shape).at_object(name));
        }
        self.index.group(parent)?;
        let (leading, trailing) = shape.split_at(chunk_shape.len());
        let grid = ChunkGrid::new(leading, chunk_shape)?;
        let row_bytes = shape_len(trailing) * ty.size();
        let mut extents = Vec::with_capacity(grid.count());
        for index in 0..grid.count() {
            let bytes = chunk(index)?;
            let expected = grid.chunk_tuples(index)? * row_bytes;
            if bytes.len() != expected {
                return Err(Error::shape_mismatch(&[expected], &[bytes.len()]).at_object(format!("{name} chunk {index}")));
            }
            extents.push(self.append(&bytes)?);
        }
        debug!(name, chunks = extents.len(), "wrote chunked dataset");
        self.add_node(
            parent,
            name,
            Node::Dataset(DatasetNode {
                attributes: Default::default(),
                dtype: DataType::Element(ty),
                shape: shape.to_vec(),
                layout: Layout::Chunked {
                    chunk_shape: chunk_shape.to_vec(),
                    extents,
                },
            }),
        )
    }

    /// Writes a one-dimensional string dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a string is too long.
    pub fn write_strings(&mut self, parent: ObjectRef, name: &str, values: &[String]) -> Result<ObjectRef> {
        self.index.group(parent)?;
        let bytes = encode_strings(values)?;
        let extent = self.append(&bytes)?;
        self.add_node(
            parent,
            name,
            Node::Dataset(DatasetNode {
                attributes: Default::default(),
                dtype: DataType::String,
                shape: vec![values.len()],
                layout: Layout::Contiguous(extent),
            }),
        )
    }

    /// Adds a hard link named `name` under `parent` to an existing object.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is not a group, `target` does not exist,
    /// or the name is taken.
    pub fn link(&mut self, parent: ObjectRef, name: &str, target: ObjectRef) -> Result<()> {
        validate_name(name)?;
        self.index.node(target)?;
        let group = self.index.group_mut(parent)?;
        if group.links.contains_key(name) {
            return Err(link_exists(name));
        }
        group.links.insert(name.to_string(), target);
        Ok(())
    }

    /// Writes the index, patches the header, and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn finish(mut self) -> Result<W> {
        let encoded = self.index.encode()?;
        let extent = self.append(&encoded)?;
        self.out.seek(SeekFrom::Start(MAGIC.len() as u64 + 4))?;
        self.out.write_all(&extent.offset.to_le_bytes())?;
        self.out.write_all(&extent.len.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(self.position))?;
        self.out.flush()?;
        debug!(
            objects = self.index.objects.len(),
            index_bytes = extent.len,
            total_bytes = self.position,
            "finished container"
        );
        Ok(self.out)
    }
}

fn link_exists(name: &str) -> Error {
    Error::invalid_format(format!("link '{name}' already exists"))
}
