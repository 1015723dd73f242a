//! Post API endpoints
//!
//! - GET /api/v1/posts - List posts
//! - GET /api/v1/posts/latest - Most recent post
//! - GET /api/v1/posts/{id} - Single post
//! - POST /api/v1/posts - Create post
//! - PUT /api/v1/posts/{id} - Replace post fields
//! - DELETE /api/v1/posts/{id} - Delete post, returning it

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreatePostInput, Post, UpdatePostInput};

/// Response for post list
#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
}

/// Response for a single post
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub post: Post,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self { post }
    }
}

/// Build the posts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/latest", get(get_latest_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
}

fn post_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    let Path(id) = path.map_err(|e| ApiError::validation_error(e.body_text()))?;
    Ok(id)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let Json(value) = body.map_err(|e| ApiError::validation_error(e.body_text()))?;
    Ok(value)
}

/// GET /api/v1/posts
async fn list_posts(State(state): State<AppState>) -> Result<Json<PostListResponse>, ApiError> {
    let posts = state.post_service.list_posts().await?;
    Ok(Json(PostListResponse { posts }))
}

/// GET /api/v1/posts/latest
async fn get_latest_post(State(state): State<AppState>) -> Result<Json<PostResponse>, ApiError> {
    let post = state.post_service.get_latest_post().await?;
    Ok(Json(post.into()))
}

/// GET /api/v1/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let id = post_id(path)?;
    let post = state.post_service.get_post(id).await?;
    Ok(Json(post.into()))
}

/// POST /api/v1/posts
async fn create_post(
    State(state): State<AppState>,
    body: Result<Json<CreatePostInput>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let input = json_body(body)?;
    let post = state.post_service.create_post(input).await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// PUT /api/v1/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdatePostInput>, JsonRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let id = post_id(path)?;
    let input = json_body(body)?;
    let post = state.post_service.update_post(id, input).await?;
    Ok(Json(post.into()))
}

/// DELETE /api/v1/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PostResponse>, ApiError> {
    let id = post_id(path)?;
    let post = state.post_service.delete_post(id).await?;
    Ok(Json(post.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, test_router};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_list() {
        let (_pool, app) = test_router().await;
        let (status, body) = send(&app, Method::GET, "/api/v1/posts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "posts": [] }));
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (_pool, app) = test_router().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/posts",
            Some(json!({ "title": "hello", "content": "hello world" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["post"]["published"], json!(true));
        let id = body["post"]["id"].as_i64().unwrap();

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/posts/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["title"], "hello");
    }

    #[tokio::test]
    async fn test_two_post_scenario() {
        let (_pool, app) = test_router().await;
        for n in 1..=2 {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/v1/posts",
                Some(json!({
                    "title": format!("this title {}", n),
                    "content": format!("this content {}", n),
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = send(&app, Method::GET, "/api/v1/posts/latest", None).await;
        assert_eq!(body["post"]["id"], 2);

        let (status, body) = send(&app, Method::DELETE, "/api/v1/posts/2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["title"], "this title 2");

        let (status, body) = send(&app, Method::DELETE, "/api/v1/posts/2", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Post with ID 2 not found");

        let (_, body) = send(&app, Method::GET, "/api/v1/posts", None).await;
        assert_eq!(body["posts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_post() {
        let (_pool, app) = test_router().await;
        send(
            &app,
            Method::POST,
            "/api/v1/posts",
            Some(json!({ "title": "old", "content": "old content" })),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/v1/posts/1",
            Some(json!({ "title": "new", "content": "new content", "published": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "post": { "id": 1, "title": "new", "content": "new content", "published": false } })
        );

        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/v1/posts/9",
            Some(json!({ "title": "x", "content": "long enough" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_and_conflict_statuses() {
        let (_pool, app) = test_router().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/posts",
            Some(json!({ "title": "t", "content": "12345" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        send(
            &app,
            Method::POST,
            "/api/v1/posts",
            Some(json!({ "title": "taken", "content": "first body" })),
        )
        .await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/posts",
            Some(json!({ "title": "taken", "content": "second body" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_malformed_requests_are_bad_requests() {
        let (_pool, app) = test_router().await;

        let (status, body) = send(&app, Method::GET, "/api/v1/posts/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/posts",
            Some(json!({ "title": "missing content" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_closed_pool_is_service_unavailable() {
        let (pool, app) = test_router().await;
        pool.close().await;

        let (status, body) = send(&app, Method::GET, "/api/v1/posts", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    }
}
