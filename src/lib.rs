//! `exo-vet` library crate.
//!
//! The binary (`exo`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the catalog harmonization, classifier and evaluation code is reusable
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod catalog;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod eval;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod scaling;
