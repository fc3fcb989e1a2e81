// SPDX-License-Identifier: GPL-3.0-or-later

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type returned by the envstore API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An error occurred while performing the HTTP request (network or protocol failure).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server responded with a non-success HTTP status code.
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    /// The login exchange was rejected or did not yield a bearer token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A polling loop exhausted its iteration budget before reaching a
    /// terminal status. Carries the last payload the server returned.
    #[error("timed out waiting for {operation}; last response: {last}")]
    PollTimeout {
        operation: String,
        last: serde_json::Value,
    },

    /// A required field was absent from an otherwise successful response.
    /// The string names the missing field.
    #[error("missing expected field: {0}")]
    MissingField(&'static str),

    /// The server reported a status value outside the known lifecycle.
    #[error("unrecognized status value: {0:?}")]
    UnknownStatus(String),

    /// The configured base URL could not be parsed.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Failed to read a specification file from disk.
    #[error("failed to read specification: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to deserialize a response body into the expected shape.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}
