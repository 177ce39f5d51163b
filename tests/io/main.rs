//! Integration tests for Layer 3: I/O
//!
//! Tests for whole-file round trips, preflight and lazy reads, failure
//! handling, legacy import, and the XDMF side-car.

mod failures;
mod legacy;
mod xdmf;
