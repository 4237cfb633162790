//! API middleware
//!
//! Shared application state and the JSON error envelope used by every
//! handler.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{SqlxPostRepository, SqlxTagRepository};
use crate::db::DynDatabasePool;
use crate::services::{
    ContentClassifier, PostService, PostServiceError, TagService, TagServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub post_service: Arc<PostService>,
    pub tag_service: Arc<TagService>,
    pub classifier: Arc<ContentClassifier>,
}

impl AppState {
    /// Wire repositories, cache and services on top of `pool`
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let cache = create_cache(&config.cache);

        let tag_service = Arc::new(TagService::new(tag_repo, post_repo.clone(), cache));
        let post_service = Arc::new(PostService::new(
            post_repo,
            tag_service.clone(),
            config.slug.clone(),
            config.content.clone(),
        ));

        Self {
            pool,
            post_service,
            tag_service,
            classifier: Arc::new(ContentClassifier::new(&config.content)),
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Malformed or mistyped request bodies
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::ValidationError(msg) | PostServiceError::InvalidTitle(msg) => {
                ApiError::validation_error(msg)
            }
            PostServiceError::SlugConflict(msg) => ApiError::conflict(msg),
            PostServiceError::NotFound(slug) => {
                ApiError::not_found(format!("Post not found: {}", slug))
            }
            PostServiceError::InternalError(e) => {
                tracing::error!("Post request failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::InternalError(e) => {
                tracing::error!("Tag request failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::validation_error("x"), StatusCode::BAD_REQUEST),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::internal_error("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_post_errors_map_to_codes() {
        let err: ApiError = PostServiceError::InvalidTitle("!!!".into()).into();
        assert_eq!(err.error.code, "VALIDATION_ERROR");

        let err: ApiError = PostServiceError::SlugConflict("busy".into()).into();
        assert_eq!(err.error.code, "CONFLICT");

        let err: ApiError = PostServiceError::InternalError(anyhow::anyhow!("db gone")).into();
        assert_eq!(err.error.code, "INTERNAL_ERROR");
        assert_eq!(err.error.message, "Internal server error");
    }

    #[test]
    fn test_error_body_shape() {
        let json = serde_json::to_value(ApiError::not_found("Post not found: x")).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Post not found: x");
        assert_eq!(json["error"].as_object().unwrap().len(), 2);
    }
}
