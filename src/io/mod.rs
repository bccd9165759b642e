//! Input/output helpers.
//!
//! - CSV ingest (`ingest`)
//! - JSON artifacts (`artifact`)
//! - CSV exports (`export`)

pub mod artifact;
pub mod export;
pub mod ingest;

pub use artifact::*;
pub use export::*;
pub use ingest::*;
