//! Leakage-safe feature scaling.

pub mod scaler;

pub use scaler::*;
