// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use thiserror::Error;

/// Failure to convert text into a typed [`Object`](crate::Object) payload.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ObjectError {
    /// The text is not a recognized color.
    #[error("invalid color '{0}'")]
    InvalidColor(String),
    /// The text is not a recognized dimension.
    #[error("invalid dimension '{0}'")]
    InvalidDimension(String),
    /// The text is not well-formed JSON.
    #[error("malformed JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ObjectError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
