//! Core identifiers, element types, shapes, and errors for datagraph.
//!
//! This crate provides:
//! - [`EntityId`] - Process-unique entity identifiers
//! - [`ElementType`] and [`Element`] - The closed set of numeric element types
//! - [`ChunkGrid`] - Row-major chunk decomposition of a tuple shape
//! - [`DataPath`] - `/`-delimited entity paths
//! - [`Error`] - Categorized error type with stable numeric codes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod element;
pub mod error;
pub mod id;
pub mod path;
pub mod shape;

pub use element::{Element, ElementType, slices_bits_eq};
pub use error::{Error, ErrorCategory, ErrorContext, ErrorKind, Result};
pub use id::EntityId;
pub use path::{DataPath, validate_name};
pub use shape::{ChunkGrid, ChunkRun, flat_index, shape_len, unflatten};
