//! Reporting: formatted terminal output and data diagnostics.

pub mod diagnostic;
pub mod format;

pub use diagnostic::*;
pub use format::*;
