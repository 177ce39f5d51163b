//! Typed stores and the shared-ownership entity graph for datagraph.
//!
//! This crate provides:
//! - [`DataStore`] - Shaped, typed arrays with contiguous or chunked backing
//! - [`ListStore`] - Variable-length lists per tuple
//! - [`StringStore`] - One string per tuple
//! - [`TypedArray`] / [`TypedList`] - Type-erased wrappers over the element set
//! - [`DataGraph`] - Rooted DAG of named entities with the last-parent rule
//! - [`Geometry`] - Composites that reference stores and attribute tables by id

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod array;
pub mod compare;
pub mod entity;
pub mod geometry;
pub mod graph;
pub mod list;
pub mod strings;
pub mod typed;

pub use array::{ChunkSource, DataStore, split_into_chunks};
pub use compare::{Difference, graph_diff};
pub use entity::{AttributeTable, Entity, EntityKind, Payload};
pub use geometry::{Geometry, GeometryCapabilities, GeometryKind, GeometryRole, GridSpec};
pub use graph::DataGraph;
pub use list::ListStore;
pub use strings::StringStore;
pub use typed::{RawChunkSource, StoreElement, TypedArray, TypedList};
