//! # Step Engines
//!
//! Implementations of the StepEngine trait beyond the scalar reference.

mod batched;

pub use batched::BatchedEngine;
