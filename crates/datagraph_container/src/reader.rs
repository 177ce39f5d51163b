//! Container reader with lazy, per-chunk payload access.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use datagraph_foundation::{ChunkGrid, DataPath, Error, ErrorKind, Result, shape_len};
use parking_lot::Mutex;
use tracing::debug;

use crate::format::{
    AttributeValue, DataType, DatasetNode, Extent, HEADER_LEN, Index, Layout, MAGIC, Node, ObjectRef, REVISION,
    decode_strings,
};

trait Source: Read + Seek + Send {}

impl<T: Read + Seek + Send> Source for T {}

struct Shared {
    source: Mutex<Box<dyn Source>>,
    index: Index,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("objects", &self.index.objects.len())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn read_extent(&self, extent: Extent) -> Result<Vec<u8>> {
        let len = usize::try_from(extent.len).map_err(|_| Error::invalid_format("extent too large"))?;
        let mut buf = vec![0u8; len];
        let mut source = self.source.lock();
        source.seek(SeekFrom::Start(extent.offset))?;
        source.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Shape and layout of a dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetInfo {
    /// Element type.
    pub dtype: DataType,
    /// Full dataset shape.
    pub shape: Vec<usize>,
    /// Chunk shape over the leading dimensions, for chunked datasets.
    pub chunk_shape: Option<Vec<usize>>,
}

/// An open container. Cloning shares the underlying file handle.
#[derive(Clone, Debug)]
pub struct ContainerReader {
    shared: Arc<Shared>,
}

impl ContainerReader {
    /// Opens a container file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a container.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to open file '{}': {e}",
                path.display()
            )))
        })?;
        Self::from_reader(BufReader::new(file)).map_err(|e| e.at_object(path.display().to_string()))
    }

    /// Reads a container from any seekable source.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or index is malformed.
    pub fn from_reader<R: Read + Seek + Send + 'static>(mut source: R) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; HEADER_LEN as usize];
        source
            .read_exact(&mut header)
            .map_err(|_| Error::invalid_format("file is too short to be a container"))?;
        let (magic, rest) = header.split_at(MAGIC.len());
        if magic != MAGIC {
            return Err(Error::invalid_format("not a datagraph container"));
        }
        let (revision, rest) = rest.split_at(4);
        let (offset, len) = rest.split_at(8);
        let revision = u32::from_le_bytes(revision.try_into().map_err(|_| Error::invalid_format("header"))?);
        if revision > REVISION {
            return Err(Error::new(ErrorKind::VersionMismatch {
                found: format!("container revision {revision}"),
                expected: format!("revision <= {REVISION}"),
            }));
        }
        let offset = u64::from_le_bytes(offset.try_into().map_err(|_| Error::invalid_format("header"))?);
        let len = u64::from_le_bytes(len.try_into().map_err(|_| Error::invalid_format("header"))?);
        if offset < HEADER_LEN {
            return Err(Error::invalid_format("container was not finished"));
        }

        let shared = Shared {
            source: Mutex::new(Box::new(source)),
            index: Index::default(),
        };
        let bytes = shared.read_extent(Extent { offset, len })?;
        let index = Index::decode(&bytes)?;
        debug!(objects = index.objects.len(), index_bytes = len, "opened container");
        Ok(Self {
            shared: Arc::new(Shared { index, ..shared }),
        })
    }

    fn index(&self) -> &Index {
        &self.shared.index
    }

    /// The root group.
    #[must_use]
    pub fn root(&self) -> ObjectRef {
        ObjectRef::ROOT
    }

    /// Number of distinct objects in the file.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.index().objects.len()
    }

    /// Returns true if `object` is a group.
    #[must_use]
    pub fn is_group(&self, object: ObjectRef) -> bool {
        matches!(self.index().node(object), Ok(Node::Group(_)))
    }

    /// Returns true if `object` is a dataset.
    #[must_use]
    pub fn is_dataset(&self, object: ObjectRef) -> bool {
        matches!(self.index().node(object), Ok(Node::Dataset(_)))
    }

    /// Links of a group in name order.
    ///
    /// # Errors
    ///
    /// Returns an error if `group` is not a group.
    pub fn children(&self, group: ObjectRef) -> Result<Vec<(String, ObjectRef)>> {
        Ok(self
            .index()
            .group(group)?
            .links
            .iter()
            .map(|(name, object)| (name.clone(), *object))
            .collect())
    }

    /// The object linked as `name` under `group`.
    #[must_use]
    pub fn child(&self, group: ObjectRef, name: &str) -> Option<ObjectRef> {
        self.index().group(group).ok()?.links.get(name).copied()
    }

    /// Follows a `/`-delimited path from the root.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is missing.
    pub fn lookup(&self, path: &str) -> Result<ObjectRef> {
        let parsed = DataPath::parse(path)?;
        let mut current = self.root();
        for segment in parsed.segments() {
            current = self
                .child(current, segment)
                .ok_or_else(|| Error::path_not_found(path))?;
        }
        Ok(current)
    }

    /// All attributes of an object.
    ///
    /// # Errors
    ///
    /// Returns an error if `object` does not exist.
    pub fn attributes(&self, object: ObjectRef) -> Result<&BTreeMap<String, AttributeValue>> {
        Ok(self.index().node(object)?.attributes())
    }

    /// One attribute of an object, if present.
    #[must_use]
    pub fn attribute(&self, object: ObjectRef, name: &str) -> Option<&AttributeValue> {
        self.index().node(object).ok()?.attributes().get(name)
    }

    fn dataset(&self, object: ObjectRef) -> Result<&DatasetNode> {
        self.index().dataset(object)
    }

    /// Shape and layout of a dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if `object` is not a dataset.
    pub fn dataset_info(&self, object: ObjectRef) -> Result<DatasetInfo> {
        let node = self.dataset(object)?;
        Ok(DatasetInfo {
            dtype: node.dtype,
            shape: node.shape.clone(),
            chunk_shape: match &node.layout {
                Layout::Contiguous(_) => None,
                Layout::Chunked { chunk_shape, .. } => Some(chunk_shape.clone()),
            },
        })
    }

    /// Reads a whole numeric dataset as packed little-endian bytes in
    /// row-major order, reassembling chunks if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `object` is not a numeric dataset or the payload
    /// cannot be read.
    pub fn read_dataset(&self, object: ObjectRef) -> Result<Vec<u8>> {
        let node = self.dataset(object)?;
        let DataType::Element(ty) = node.dtype else {
            return Err(Error::type_mismatch("numeric dataset", "string dataset"));
        };
        let expected = shape_len(&node.shape) * ty.size();
        let bytes = match &node.layout {
            Layout::Contiguous(extent) => self.shared.read_extent(*extent)?,
            Layout::Chunked { .. } => {
                let chunks = self.chunks(object)?;
                let row_bytes = chunks.row_bytes;
                let mut out = vec![0u8; expected];
                for index in 0..chunks.count() {
                    let data = chunks.read(index)?;
                    for run in chunks.grid.runs(index)? {
                        let src = run.chunk_offset * row_bytes;
                        let dst = run.flat_offset * row_bytes;
                        let len = run.len * row_bytes;
                        out[dst..dst + len].copy_from_slice(&data[src..src + len]);
                    }
                }
                out
            }
        };
        if bytes.len() != expected {
            return Err(Error::shape_mismatch(&[expected], &[bytes.len()]).at_object(format!("{object}")));
        }
        Ok(bytes)
    }

    /// Reads a string dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if `object` is not a string dataset.
    pub fn read_strings(&self, object: ObjectRef) -> Result<Vec<String>> {
        let node = self.dataset(object)?;
        match (&node.dtype, &node.layout) {
            (DataType::String, Layout::Contiguous(extent)) => {
                decode_strings(&self.shared.read_extent(*extent)?, shape_len(&node.shape))
            }
            _ => Err(Error::type_mismatch("string dataset", node.dtype.to_string())),
        }
    }

    /// A handle that reads individual chunks of a chunked dataset on demand.
    ///
    /// The handle keeps the file open after this reader is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if `object` is not a chunked numeric dataset.
    pub fn chunks(&self, object: ObjectRef) -> Result<DatasetChunks> {
        let node = self.dataset(object)?;
        let DataType::Element(ty) = node.dtype else {
            return Err(Error::type_mismatch("numeric dataset", "string dataset"));
        };
        let Layout::Chunked { chunk_shape, extents } = &node.layout else {
            return Err(Error::type_mismatch("chunked dataset", "contiguous dataset"));
        };
        let (leading, trailing) = node.shape.split_at(chunk_shape.len().min(node.shape.len()));
        let grid = ChunkGrid::new(leading, chunk_shape)?;
        if grid.count() != extents.len() {
            return Err(Error::invalid_format(format!(
                "{object} has {} chunk extents for {} chunks",
                extents.len(),
                grid.count()
            )));
        }
        Ok(DatasetChunks {
            shared: Arc::clone(&self.shared),
            grid,
            row_bytes: shape_len(trailing) * ty.size(),
            extents: extents.clone(),
        })
    }
}

/// Lazy access to the chunks of one dataset.
#[derive(Clone, Debug)]
pub struct DatasetChunks {
    shared: Arc<Shared>,
    grid: ChunkGrid,
    row_bytes: usize,
    extents: Vec<Extent>,
}

impl DatasetChunks {
    /// Number of chunks.
    #[must_use]
    pub fn count(&self) -> usize {
        self.extents.len()
    }

    /// The chunk decomposition of the leading dimensions.
    #[must_use]
    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    /// Reads one chunk's bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range, the read fails, or the
    /// stored chunk has the wrong size.
    pub fn read(&self, index: usize) -> Result<Vec<u8>> {
        let extent = *self
            .extents
            .get(index)
            .ok_or_else(|| Error::out_of_range(index, self.extents.len()))?;
        let bytes = self.shared.read_extent(extent)?;
        let expected = self.grid.chunk_tuples(index)? * self.row_bytes;
        if bytes.len() != expected {
            return Err(Error::shape_mismatch(&[expected], &[bytes.len()]));
        }
        Ok(bytes)
    }
}
