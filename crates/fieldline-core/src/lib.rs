//! Shared data model, error taxonomy and configuration for the FieldLine platform.
//!
//! Every other crate in the workspace depends on this one for the entity types (`Job`,
//! `Contact`, `Worker`, …), the tenant-scoping newtype IDs, and the `ApiError` taxonomy
//! that component-specific errors convert into at the boundary.

pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{ApiError, Result};
    pub use crate::ids::*;
    pub use crate::model::*;
}
