//! Options for writing and reading graph containers.

/// Controls how a graph is written.
#[derive(Clone, Debug)]
pub struct WriteOptions {
    /// Write chunked stores with their own chunk layout.
    pub preserve_chunking: bool,

    /// Chunk every contiguous array whose tuple rank matches this shape.
    pub chunk_shape: Option<Vec<usize>>,

    /// Write to a temporary file and rename it over the target when done.
    pub atomic: bool,

    /// Also write an XDMF description next to the container.
    pub write_xdmf: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            preserve_chunking: true,
            chunk_shape: None,
            atomic: true,
            write_xdmf: false,
        }
    }
}

impl WriteOptions {
    /// Options that also emit the XDMF side-car.
    #[must_use]
    pub fn with_xdmf() -> Self {
        Self {
            write_xdmf: true,
            ..Self::default()
        }
    }

    /// Builder method to keep or drop the stores' own chunk layout.
    #[must_use]
    pub fn with_preserve_chunking(mut self, preserve: bool) -> Self {
        self.preserve_chunking = preserve;
        self
    }

    /// Builder method to chunk contiguous arrays.
    #[must_use]
    pub fn with_chunk_shape(mut self, chunk_shape: Vec<usize>) -> Self {
        self.chunk_shape = Some(chunk_shape);
        self
    }

    /// Builder method to toggle atomic replacement.
    #[must_use]
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Builder method to toggle the XDMF side-car.
    #[must_use]
    pub fn with_write_xdmf(mut self, write_xdmf: bool) -> Self {
        self.write_xdmf = write_xdmf;
        self
    }
}

/// Controls how a graph is read.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Build structure and shapes only; stores are left without payload.
    pub preflight: bool,

    /// Leave chunked datasets on disk until a chunk is first touched.
    pub lazy: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            preflight: false,
            lazy: true,
        }
    }
}

impl ReadOptions {
    /// Options for a structure-only read.
    #[must_use]
    pub fn preflight() -> Self {
        Self {
            preflight: true,
            ..Self::default()
        }
    }

    /// Options that load every payload immediately.
    #[must_use]
    pub fn eager() -> Self {
        Self {
            preflight: false,
            lazy: false,
        }
    }

    /// Builder method to toggle preflight.
    #[must_use]
    pub fn with_preflight(mut self, preflight: bool) -> Self {
        self.preflight = preflight;
        self
    }

    /// Builder method to toggle lazy chunk loading.
    #[must_use]
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }
}
