//! Recipe reading errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading and structurally validating recipes.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {cause}", path.display())]
    Parse { path: PathBuf, cause: String },

    /// `${VAR}` referenced a variable that is neither set nor defaulted.
    #[error("variable \"{name}\" is not set (referenced in {})", path.display())]
    UnsetVariable { name: String, path: PathBuf },

    /// The document parsed but fails the structural rules.
    #[error("invalid recipe {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}
