//! Hierarchical container files for datagraph.
//!
//! A container holds groups, typed datasets, and typed attributes, with hard
//! links letting one object appear under several names. Datasets are either
//! contiguous or chunked; chunks are stored as independent byte extents so a
//! reader can load them one at a time.
//!
//! This crate provides:
//! - [`ContainerWriter`] - Streams payloads and writes the object index last
//! - [`ContainerReader`] - Opens a container and reads payloads on demand
//! - [`DatasetChunks`] - Lazy per-chunk access that outlives the reader
//! - [`AttributeValue`] - Typed attribute values

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{AttributeValue, DataType, Extent, HEADER_LEN, MAGIC, ObjectRef, REVISION};
pub use reader::{ContainerReader, DatasetChunks, DatasetInfo};
pub use writer::ContainerWriter;
