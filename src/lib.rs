//! Moment embedding and clustering of collections of biological networks,
//! with time and memory monitoring of the computation.
//!
//! See [study::run_study] for the pipeline and the binary cluster_study for options.
//! The logger is installed by the binary, tests install their own with `is_test(true)`.

pub mod errors;

pub mod config;

pub mod io;

pub mod embedding;

pub mod cluster;

pub mod monitor;

pub mod study;

pub mod prelude;
