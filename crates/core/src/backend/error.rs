use serde_json::Value;
use std::fmt;

pub const HTTP_CONFLICT: u16 = 409;

/// Non-2xx answer from the backend, kept whole so callers can branch on the status.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub endpoint: String,
    pub status: u16,
    pub detail: String,
    pub payload: Option<Value>,
}

impl ApiError {
    pub fn from_response(endpoint: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let payload = serde_json::from_str::<Value>(body).ok();
        let detail = payload
            .as_ref()
            .and_then(|v| v.get("detail"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                let text = body.trim();
                (!text.is_empty() && payload.as_ref().map_or(true, Value::is_string))
                    .then(|| text.trim_matches('"').to_string())
            })
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "backend request failed".to_string());

        Self {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            detail,
            payload,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status == HTTP_CONFLICT
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backend error (endpoint={}, status={}): {}",
            self.endpoint, self.status, self.detail
        )
    }
}

impl std::error::Error for ApiError {}

/// Finds an [`ApiError`] anywhere in the chain of `err`.
pub fn api_error(err: &anyhow::Error) -> Option<&ApiError> {
    err.chain().find_map(|e| e.downcast_ref::<ApiError>())
}

/// The conflict detail when `err` is a 409 from the backend.
pub fn conflict(err: &anyhow::Error) -> Option<&ApiError> {
    api_error(err).filter(|e| e.is_conflict())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use reqwest::StatusCode;

    #[test]
    fn detail_comes_from_json_detail_field() {
        let e = ApiError::from_response(
            "clientes/1/mt5/compra/",
            StatusCode::CONFLICT,
            r#"{"detail": "Cliente já possui posição aberta"}"#,
        );
        assert!(e.is_conflict());
        assert_eq!(e.detail, "Cliente já possui posição aberta");
        assert!(e.payload.is_some());
    }

    #[test]
    fn detail_falls_back_to_text_then_reason() {
        let e = ApiError::from_response("x/", StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(e.detail, "upstream down");
        assert!(e.payload.is_none());

        let e = ApiError::from_response("x/", StatusCode::BAD_REQUEST, r#"{"ticker": ["required"]}"#);
        assert_eq!(e.detail, "Bad Request");

        let e = ApiError::from_response("x/", StatusCode::NOT_FOUND, "");
        assert_eq!(e.detail, "Not Found");
    }

    #[test]
    fn conflict_is_found_through_context_layers() {
        let err = anyhow::Error::new(ApiError::from_response("x/", StatusCode::CONFLICT, ""));
        let err = Err::<(), _>(err).context("submit buy failed").unwrap_err();
        assert!(conflict(&err).is_some());

        let other = anyhow::Error::new(ApiError::from_response("x/", StatusCode::INTERNAL_SERVER_ERROR, ""));
        assert!(conflict(&other).is_none());
        assert!(api_error(&other).is_some());
    }
}
