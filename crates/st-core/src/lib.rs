//! st-core: shared foundation for stormtrap.
//!
//! Contains:
//! - units (uom SI types + hectare/kilogram/day conversions used at file boundaries)
//! - numeric (Real + tolerances + scaled decimal arithmetic)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod units;

pub use error::{StError, StResult};
pub use numeric::*;
pub use units::*;
