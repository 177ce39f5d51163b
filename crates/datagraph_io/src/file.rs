//! File-level entry points: version detection, reading, and writing.

use std::fmt;
use std::io::BufWriter;
use std::path::Path;

use datagraph_container::{ContainerReader, ContainerWriter};
use datagraph_foundation::{Error, ErrorKind, Result};
use datagraph_storage::DataGraph;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::{ReadOptions, WriteOptions};
use crate::constants::{CURRENT_VERSION, FILE_VERSION, LEGACY_VERSION};
use crate::legacy::read_legacy;
use crate::reader::read_graph;
use crate::writer::{ensure_loaded, write_graph};
use crate::xdmf::write_xdmf;

/// Layout versions this crate reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileVersion {
    /// The current layout, with recorded ids and hard-linked sharing.
    Current,
    /// The legacy data-container layout.
    Legacy,
}

impl FileVersion {
    /// The tag stored in the file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Current => CURRENT_VERSION,
            Self::Legacy => LEGACY_VERSION,
        }
    }

    /// Parses a stored tag.
    ///
    /// # Errors
    ///
    /// Returns a version mismatch error for unknown tags.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            CURRENT_VERSION => Ok(Self::Current),
            LEGACY_VERSION => Ok(Self::Legacy),
            _ => Err(Error::new(ErrorKind::VersionMismatch {
                found: tag.to_string(),
                expected: format!("{CURRENT_VERSION} or {LEGACY_VERSION}"),
            })),
        }
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The layout version of an open container.
///
/// # Errors
///
/// Returns an error if the version tag is missing or unknown.
pub fn container_version(reader: &ContainerReader) -> Result<FileVersion> {
    let tag = reader
        .attribute(reader.root(), FILE_VERSION)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::missing_metadata("/", FILE_VERSION))?;
    FileVersion::parse(tag)
}

/// The layout version of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its version tag is
/// missing or unknown.
pub fn file_version(path: impl AsRef<Path>) -> Result<FileVersion> {
    container_version(&ContainerReader::open(path)?)
}

/// Writes `graph` to `path` with default options.
///
/// # Errors
///
/// See [`write_file_with`].
pub fn write_file(graph: &DataGraph, path: impl AsRef<Path>) -> Result<()> {
    write_file_with(graph, path, &WriteOptions::default())
}

/// Writes `graph` to `path`.
///
/// With [`WriteOptions::atomic`] the container is built in a temporary file
/// beside `path` and renamed over it, so a failed write leaves any existing
/// file untouched.
///
/// # Errors
///
/// Returns an error if a store is a preflight placeholder, the graph cannot
/// be laid out, or the file cannot be written.
pub fn write_file_with(graph: &DataGraph, path: impl AsRef<Path>, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    ensure_loaded(graph)?;
    if options.atomic {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to create temporary file in '{}': {e}",
                dir.display()
            )))
        })?;
        let mut container = ContainerWriter::new(BufWriter::new(temp))?;
        write_graph(graph, &mut container, options)?;
        let temp = container
            .finish()?
            .into_inner()
            .map_err(|e| Error::io(e.error().to_string()))?;
        temp.persist(path).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to replace '{}': {}",
                path.display(),
                e.error
            )))
        })?;
    } else {
        let mut container = ContainerWriter::create(path)?;
        write_graph(graph, &mut container, options)?;
        container.finish()?;
    }
    info!(path = %path.display(), entities = graph.len(), "wrote file");

    if options.write_xdmf {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::io(format!("'{}' has no file name", path.display())))?;
        write_xdmf(path.with_extension("xdmf"), graph, &file_name)?;
    }
    Ok(())
}

/// Reads the file at `path`, loading every payload.
///
/// # Errors
///
/// See [`read_file_with`].
pub fn read_file(path: impl AsRef<Path>) -> Result<DataGraph> {
    read_file_with(path, &ReadOptions::default())
}

/// Reads structure and shapes only; stores are placeholders.
///
/// # Errors
///
/// See [`read_file_with`].
pub fn read_file_preflight(path: impl AsRef<Path>) -> Result<DataGraph> {
    read_file_with(path, &ReadOptions::preflight())
}

/// Reads the file at `path` in whichever layout it carries.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, its version is unknown, or
/// its content is malformed.
pub fn read_file_with(path: impl AsRef<Path>, options: &ReadOptions) -> Result<DataGraph> {
    let path = path.as_ref();
    let reader = ContainerReader::open(path)?;
    let version = container_version(&reader).map_err(|e| e.at_object(path.display().to_string()))?;
    debug!(path = %path.display(), %version, "reading file");
    match version {
        FileVersion::Current => read_graph(&reader, options),
        FileVersion::Legacy => read_legacy(&reader, options),
    }
}
