//! Error types for the generator.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for generator operations
pub type Result<T, E = CodegenError> = std::result::Result<T, E>;

/// Failures that abort a whole generator run.
///
/// Problems with individual wrapper declarations are not errors; they are
/// reported as [`Diagnostic`](crate::Diagnostic)s and only affect that wrapper.
#[derive(Error, Debug)]
pub enum CodegenError {
    /// I/O error while reading declarations or writing output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A declaration file is not valid Rust syntax
    #[error("failed to parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: syn::Error },

    /// Walking a declaration directory failed
    #[error("failed to walk declaration directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// The host cancelled the run; no output was produced
    #[error("generation cancelled")]
    Cancelled,
}

impl CodegenError {
    /// Create a parse error for `path`
    pub fn parse(path: impl Into<PathBuf>, source: syn::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}
