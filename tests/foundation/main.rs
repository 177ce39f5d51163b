//! Integration tests for Layer 0: Foundation
//!
//! Tests for identifiers, element types, paths, shapes, and errors.

mod elements;
mod errors;
mod paths;
mod shapes;
