//! Recipe model and reader.
//!
//! A recipe declares one pipeline: a source, zero or more processors, and
//! at least one sink. Recipes are YAML documents, one per file; the reader
//! keeps the source positions of every plugin reference so diagnostics can
//! point back into the file.

mod error;
mod reader;
mod schema;
mod validation;

pub use error::RecipeError;
pub use reader::RecipeReader;
pub use schema::{PluginRef, Recipe};
pub use validation::validate_recipe;

pub use meteor_core::Position;
