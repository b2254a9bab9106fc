//! Error type for the core transformations.
//!
//! Malformed *data* is never an error here; traversal tolerates and skips
//! unexpected shapes. Only malformed *configuration* surfaces as [`CoreError`].

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A configuration token (reseed mode, counting scope) was not
    /// recognized. Raised before any mutation is applied.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
