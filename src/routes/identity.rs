use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::{dto::common::Identity, error::AppError};

const USER_ID_HEADER: &str = "x-user-id";
const USER_NAME_HEADER: &str = "x-user-name";
const DEVICE_ID_HEADER: &str = "x-device-id";

const DEFAULT_USER_NAME: &str = "Anonymous";
const DEFAULT_DEVICE_ID: &str = "default";
const MAX_HEADER_LEN: usize = 128;

/// Resolve the caller from the identity provider headers and expose it to
/// handlers as an [`Identity`] extension.
pub async fn require_user(mut req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let identity = identity_from_headers(req.headers())?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, AppError> {
    let owner = header_value(headers, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("missing user header `X-User-Id`".into()))?;
    if owner.len() > MAX_HEADER_LEN {
        return Err(AppError::BadRequest(format!(
            "`X-User-Id` exceeds {MAX_HEADER_LEN} characters"
        )));
    }

    Ok(Identity {
        owner,
        owner_name: header_value(headers, USER_NAME_HEADER)
            .unwrap_or_else(|| DEFAULT_USER_NAME.to_string()),
        device: header_value(headers, DEVICE_ID_HEADER)
            .filter(|device| device.len() <= MAX_HEADER_LEN)
            .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
    })
}

/// Trimmed, non-empty header value made of visible ASCII.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.chars().any(char::is_control))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn defaults_apply_to_optional_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1"));

        let identity = identity_from_headers(&headers).unwrap();
        assert_eq!(identity.owner, "u-1");
        assert_eq!(identity.owner_name, "Anonymous");
        assert_eq!(identity.device, "default");
    }

    #[test]
    fn missing_or_blank_user_is_rejected() {
        assert!(matches!(
            identity_from_headers(&HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        assert!(identity_from_headers(&headers).is_err());
    }

    #[test]
    fn device_header_selects_workspace() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1"));
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("ann@example.org"));
        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_static("tablet"));

        let identity = identity_from_headers(&headers).unwrap();
        assert_eq!(identity.owner_name, "ann@example.org");
        assert_eq!(identity.device, "tablet");
    }
}
