//! Content preview endpoint
//!
//! - POST /api/preview - Classify and render unsaved content

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::ClassificationResult;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub content: String,
}

/// Build the preview router
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(preview))
}

/// POST /api/preview
///
/// Content that cannot be rendered comes back as the error fragment; only a
/// malformed request body is rejected.
async fn preview(
    State(state): State<AppState>,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Json<ClassificationResult>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.classifier.classify(&request.content)))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_router};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_preview_markdown() {
        let app = test_router().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/preview",
            Some(json!({"content": "**bold** move"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_markdown"], true);
        assert!(body["html"].as_str().unwrap().contains("<strong style="));
    }

    #[tokio::test]
    async fn test_preview_plain_and_empty() {
        let app = test_router().await;

        let (_, body) = send(&app, Method::POST, "/api/preview", Some(json!({"content": "a\nb"}))).await;
        assert_eq!(body["is_markdown"], false);
        assert_eq!(body["html"], "a<br>b");

        let (_, body) = send(&app, Method::POST, "/api/preview", Some(json!({}))).await;
        assert_eq!(body["html"], "");
    }

    #[tokio::test]
    async fn test_preview_rejects_malformed_body() {
        let app = test_router().await;
        let (status, body) =
            send(&app, Method::POST, "/api/preview", Some(json!({"content": 42}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
