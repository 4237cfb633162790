//! Post API endpoints
//!
//! - GET /api/posts - List published posts
//! - POST /api/posts - Create a post
//! - GET /api/posts/{slug} - Get a published post with rendered HTML

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreatePostInput, ListParams, Post};
use crate::services::ContentClassifier;

/// Query parameters for listing posts
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub tag: Option<String>,
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

/// Response for post list
#[derive(Debug, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummaryResponse>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// A post as shown in listings
#[derive(Debug, Serialize, Deserialize)]
pub struct PostSummaryResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub excerpt_html: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

impl PostSummaryResponse {
    fn render(post: Post, classifier: &ContentClassifier) -> Self {
        Self {
            excerpt_html: classifier.render_excerpt(&post.excerpt),
            id: post.id,
            title: post.title,
            slug: post.slug,
            excerpt: post.excerpt,
            tags: post.tags,
            created_at: post.created_at.to_rfc3339(),
        }
    }
}

/// A single post with its rendered body
#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_html: String,
    pub is_markdown: bool,
    pub excerpt: String,
    pub excerpt_html: String,
    pub published: bool,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PostResponse {
    fn render(post: Post, classifier: &ContentClassifier) -> Self {
        let body = classifier.classify(&post.content);
        Self {
            excerpt_html: classifier.render_excerpt(&post.excerpt),
            content_html: body.html,
            is_markdown: body.is_markdown,
            id: post.id,
            title: post.title,
            slug: post.slug,
            content: post.content,
            excerpt: post.excerpt,
            published: post.published,
            tags: post.tags,
            created_at: post.created_at.to_rfc3339(),
            updated_at: post.updated_at.to_rfc3339(),
        }
    }
}

/// Build the posts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{slug}", get(get_post))
}

/// GET /api/posts
async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<ListPostsQuery>, QueryRejection>,
) -> Result<Json<PostListResponse>, ApiError> {
    let Query(query) = query?;
    let params = ListParams::new(query.page, query.limit)
        .with_tag(query.tag)
        .with_search(query.search);

    let result = state.post_service.list_published(&params).await?;
    let total_pages = result.total_pages();

    Ok(Json(PostListResponse {
        posts: result
            .items
            .into_iter()
            .map(|post| PostSummaryResponse::render(post, &state.classifier))
            .collect(),
        total: result.total,
        page: result.page,
        limit: result.per_page,
        total_pages,
    }))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    payload: Result<Json<CreatePostInput>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let Json(input) = payload?;
    let post = state.post_service.create(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(PostResponse::render(post, &state.classifier)),
    ))
}

/// GET /api/posts/{slug}
async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state.post_service.get_by_slug(&slug).await?;
    Ok(Json(PostResponse::render(post, &state.classifier)))
}
