//! Fatal pipeline errors.
//!
//! Each variant names the step that failed. Face detection problems are not
//! here: they are downgraded to zero faces (see [`crate::faces`]).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Conversion error: {0}")]
    Conversion(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error("Encode error: {0}")]
    Encode(String),
}
