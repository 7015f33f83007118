//! JSON response envelopes returned by the endpoint.

use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

use crate::error::GatewayError;

#[derive(Debug, Serialize)]
struct SyncEnvelope<T> {
    #[serde(rename = "type")]
    kind: &'static str,
    status: &'static str,
    status_code: u16,
    metadata: T,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    error: &'a str,
    error_code: u16,
}

/// Successful synchronous response carrying `metadata`.
pub fn sync_response<T: Serialize>(metadata: T) -> Response {
    let envelope = SyncEnvelope {
        kind: "sync",
        status: "Success",
        status_code: StatusCode::OK.as_u16(),
        metadata,
    };
    warp::reply::with_status(warp::reply::json(&envelope), StatusCode::OK).into_response()
}

/// Empty successful response.
pub fn empty_sync_response() -> Response {
    sync_response(serde_json::Value::Null)
}

/// Error response with the given status.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let envelope = ErrorEnvelope {
        kind: "error",
        error: message,
        error_code: status.as_u16(),
    };
    warp::reply::with_status(warp::reply::json(&envelope), status).into_response()
}

impl Reply for GatewayError {
    fn into_response(self) -> Response {
        error_response(self.status(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_empty_sync_response() {
        let response = empty_sync_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["type"], "sync");
        assert_eq!(body["status"], "Success");
        assert_eq!(body["status_code"], 200);
        assert!(body["metadata"].is_null());
    }

    #[tokio::test]
    async fn test_error_response() {
        let response = error_response(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"], "boom");
        assert_eq!(body["error_code"], 500);
    }

    #[tokio::test]
    async fn test_gateway_error_reply() {
        let response = GatewayError::BodyTooLarge { max: 8 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Request body larger than 8 bytes");
    }
}
