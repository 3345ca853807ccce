//! Native backends
//!
//! - **c**: C source generation, compilation to shared objects and loading

pub mod c;
