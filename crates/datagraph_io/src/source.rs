//! Lazy chunk loading from an open container.

use datagraph_container::DatasetChunks;
use datagraph_foundation::Result;
use datagraph_storage::RawChunkSource;
use tracing::trace;

/// Feeds a chunked store from the chunks of one container dataset.
///
/// Holds its own handle on the container, so the store stays loadable after
/// the reader that created it is dropped.
#[derive(Clone, Debug)]
pub struct ContainerChunkSource {
    name: String,
    chunks: DatasetChunks,
}

impl ContainerChunkSource {
    /// Wraps the chunks of the dataset at `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, chunks: DatasetChunks) -> Self {
        Self {
            name: name.into(),
            chunks,
        }
    }
}

impl RawChunkSource for ContainerChunkSource {
    fn read_chunk_bytes(&self, index: usize) -> Result<Vec<u8>> {
        trace!(dataset = %self.name, index, "loading chunk");
        self.chunks.read(index).map_err(|e| e.at_object(self.name.clone()))
    }
}
