//! Sprig benchmarking suite
//!
//! Benchmarks for resolution, lock rendering and parsing, and version
//! constraint parsing. The fixtures in [`common`] generate synthetic indexes
//! so runs do not depend on the network.

pub mod common;

pub use common::*;
