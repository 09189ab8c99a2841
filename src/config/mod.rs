//! Schedule configuration
//!
//! Loading and validation of YAML schedules consumed by the CLI.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
