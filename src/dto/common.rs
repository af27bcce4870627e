use serde::Serialize;
use utoipa::ToSchema;

/// Caller identity resolved from the identity provider headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque user identifier (`X-User-Id`).
    pub owner: String,
    /// Display name or e-mail (`X-User-Name`).
    pub owner_name: String,
    /// Device of the user issuing the request (`X-Device-Id`).
    pub device: String,
}

/// Generic acknowledgement returned by operations without a richer payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
