//! Random CSTN/CSTNU instance generation for testing and benchmarking.
//!
//! Every generated instance satisfies the checker's well-definedness
//! preconditions by construction; whether it is *controllable* is up to the
//! dice, which is the point.

pub mod generator;

pub use generator::{generate_mult_instances, generate_single_instance, Instance, InstanceParams};
