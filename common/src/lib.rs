//! Ledgercore Common Types
//!
//! This crate contains shared types used across the ledgercore backend,
//! including identifiers, monetary types, error kinds, and time utilities.

pub mod error;
pub mod identifiers;
pub mod monetary;
pub mod time;

pub use error::*;
pub use identifiers::*;
pub use monetary::*;
pub use time::*;
