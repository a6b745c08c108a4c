//! # Workflows Module
//!
//! The highest-level, user-facing layer: it ties configuration resolution,
//! input materialization, the pipeline engine, and artifact conversion into
//! a single entry point for running the preparation pipeline end to end.

pub mod setup;
