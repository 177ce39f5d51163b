//! Integration tests for Layer 1: Storage
//!
//! Tests for typed stores, the entity graph, geometries, and graph comparison.

mod compare;
mod geometries;
mod graph;
mod stores;
