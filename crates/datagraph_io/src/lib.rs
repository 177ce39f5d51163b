//! Serialization of datagraph graphs.
//!
//! This crate provides:
//! - [`write_file`] and [`read_file`] - Whole-graph file I/O with version detection
//! - [`GraphWriter`] and [`GraphReader`] - The current layout over an open container
//! - [`LegacyImporter`] - Conversion of the legacy data-container layout
//! - [`write_xdmf`] - An XDMF side-car for visualization tools
//! - [`WriteOptions`] and [`ReadOptions`] - Chunking, atomicity, preflight, and lazy loading

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod constants;
pub mod file;
pub mod legacy;
pub mod reader;
pub mod source;
pub mod writer;
pub mod xdmf;

pub use config::{ReadOptions, WriteOptions};
pub use file::{
    FileVersion, container_version, file_version, read_file, read_file_preflight, read_file_with, write_file,
    write_file_with,
};
pub use legacy::{LegacyImporter, legacy_geometry_kind, read_legacy};
pub use reader::{GraphReader, is_unknown_content, read_graph};
pub use source::ContainerChunkSource;
pub use writer::{GraphWriter, companion_name, write_graph};
pub use xdmf::{number_type, write_xdmf, write_xdmf_to};
