//! Catalog harmonization.
//!
//! Responsibilities:
//!
//! - resolve per-survey column names to canonical fields (`harmonize`)
//! - build canonical feature vectors with completeness filtering (`extract`)
//! - apply the per-source label policy (`label`)
//! - combine sources into one tagged dataset with diagnostic counts (`combine`)

pub mod combine;
pub mod extract;
pub mod harmonize;
pub mod label;

pub use combine::*;
pub use extract::*;
pub use harmonize::*;
pub use label::*;
