//! Failures of the CouchDB score store.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for CouchDB calls.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures talking to CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("invalid CouchDB base URL `{url}`")]
    InvalidBaseUrl { url: String },
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// Reaching the database while checking or creating it failed.
    #[error("could not {step} CouchDB database `{database}`")]
    Database {
        database: String,
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} while preparing database `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    #[error("CouchDB request to `{path}` failed")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    #[error("CouchDB response for `{path}` is not valid JSON")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("document `{path}` does not match the expected model")]
    DeserializeValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("document id `{doc_id}` is malformed: {kind}")]
    InvalidDocId { doc_id: String, kind: &'static str },
}

impl CouchDaoError {
    /// Whether the server was reached and refused the request or its data.
    /// Anything else means CouchDB could not be talked to at all.
    pub fn is_rejection(&self) -> bool {
        match self {
            CouchDaoError::RequestStatus { status, .. } => status.is_client_error(),
            CouchDaoError::DeserializeValue { .. } | CouchDaoError::InvalidDocId { .. } => true,
            _ => false,
        }
    }
}
