//! Tag API endpoints
//!
//! - GET /api/tags - Ranked tag cloud, most popular tag and post total

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{SizedTag, TagAggregate};

/// Response for the tag listing
#[derive(Debug, Serialize, Deserialize)]
pub struct TagListResponse {
    pub tags: Vec<SizedTag>,
    pub most_popular: Option<TagAggregate>,
    pub total_posts: i64,
}

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_tags))
}

/// GET /api/tags
async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>, ApiError> {
    let listing = state.tag_service.listing().await?;

    Ok(Json(TagListResponse {
        tags: listing.ranked.sized_tags,
        most_popular: listing.ranked.most_popular,
        total_posts: listing.total_posts,
    }))
}
