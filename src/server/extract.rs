//! Request extractors that reject with `AppError`, so a malformed body or
//! query string gets the same `{"error", "code"}` 400 as any other bad input.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::debug;

use crate::error::AppError;

/// JSON body in, JSON body out.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response { axum::Json(self.0).into_response() }
}

#[derive(Debug, Clone, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

// Serde's message names fields and byte offsets; it goes to the log only.
impl From<JsonRejection> for AppError {
    fn from(rej: JsonRejection) -> Self {
        debug!(target: "http", "json body rejected: {}", rej.body_text());
        match rej {
            JsonRejection::MissingJsonContentType(_) => {
                AppError::user("invalid_input", "expected an application/json body")
            }
            JsonRejection::JsonDataError(_) => {
                AppError::user("invalid_input", "request body has missing or invalid fields")
            }
            _ => AppError::user("invalid_input", "request body is not valid JSON"),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rej: QueryRejection) -> Self {
        debug!(target: "http", "query string rejected: {}", rej.body_text());
        AppError::user("invalid_input", "invalid query string")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Serialize)]
    struct Page {
        limit: u32,
    }

    fn router() -> Router {
        Router::new()
            .route("/echo", post(|Json(p): Json<Page>| async move { Json(p) }))
            .route("/page", get(|Query(p): Query<Page>| async move { p.limit.to_string() }))
    }

    async fn send(req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    fn post_json(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn valid_body_passes_through() {
        let (status, body) = send(post_json(r#"{"limit": 5}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 5);
    }

    #[tokio::test]
    async fn bad_bodies_are_400_json_without_serde_detail() {
        for raw in ["{not json", r#"{"limit": "five"}"#, "{}"] {
            let (status, body) = send(post_json(raw)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", raw);
            assert_eq!(body["code"], "invalid_input");
            let msg = body["error"].as_str().unwrap();
            assert!(!msg.contains("line") && !msg.contains("limit"), "{}", msg);
        }
        let no_type = Request::builder().method("POST").uri("/echo").body(Body::from(r#"{"limit": 5}"#)).unwrap();
        let (status, body) = send(no_type).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn bad_query_is_400_json() {
        let req = Request::builder().uri("/page?limit=lots").body(Body::empty()).unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid query string");
    }
}
