//! Datagraph - Shared-ownership entity graph of typed scientific arrays
//!
//! This crate re-exports all layers of the datagraph system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: datagraph_io         - Graph writer, reader, legacy import, XDMF
//! Layer 2: datagraph_container  - Hierarchical container file format
//! Layer 1: datagraph_storage    - Typed stores, entity graph, geometries
//! Layer 0: datagraph_foundation - Ids, paths, element types, errors
//! ```

pub use datagraph_container as container;
pub use datagraph_foundation as foundation;
pub use datagraph_io as io;
pub use datagraph_storage as storage;
