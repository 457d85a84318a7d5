//! HTTP API for Diarykeep
//!
//! Wraps a [`DiaryService`] in an axum `Router` with CORS and request
//! tracing.
//!
//! ## Endpoint Map
//!
//! | Method | Path                                   | Description                 |
//! |--------|----------------------------------------|-----------------------------|
//! | GET    | `/health`                              | Health check                |
//! | GET    | `/api/v1/documents`                    | List documents              |
//! | POST   | `/api/v1/documents`                    | Create a document           |
//! | GET    | `/api/v1/documents/:id`                | Document detail             |
//! | PUT    | `/api/v1/documents/:id`                | Replace title and body      |
//! | DELETE | `/api/v1/documents/:id`                | Delete a document           |
//! | GET    | `/api/v1/documents/:id/insights`       | Insights of a document      |
//! | POST   | `/api/v1/documents/:id/insights`       | Generate a first insight    |
//! | POST   | `/api/v1/documents/:id/insights/sync`  | Push insights to remote     |
//! | GET    | `/api/v1/insights/:id`                 | Insight detail              |
//! | POST   | `/api/v1/insights/:id/follow-up`       | Continue the conversation   |
//! | DELETE | `/api/v1/insights/:id`                 | Delete an insight           |
//! | POST   | `/api/v1/memories`                     | Remember an entry           |
//! | GET    | `/api/v1/memories/search`              | Search memories             |
//! | POST   | `/api/v1/memories/context`             | Build a memory context      |

use crate::error::Error;
use crate::service::DiaryService;
use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Default number of memories returned by search and context endpoints
const DEFAULT_MEMORY_LIMIT: usize = 5;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DiaryService>,
}

/// Build the complete HTTP application
pub fn build_app(service: Arc<DiaryService>, cors_origins: &[String]) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health_check))
        .merge(documents_router())
        .merge(insights_router())
        .merge(memories_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(cors_origins))
}

fn documents_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/documents",
            get(list_documents).post(create_document),
        )
        .route(
            "/api/v1/documents/:id",
            get(get_document)
                .put(update_document)
                .delete(delete_document),
        )
        .route(
            "/api/v1/documents/:id/insights",
            get(list_insights).post(generate_insight),
        )
        .route("/api/v1/documents/:id/insights/sync", post(sync_insights))
}

fn insights_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/insights/:id",
            get(get_insight).delete(delete_insight),
        )
        .route("/api/v1/insights/:id/follow-up", post(follow_up))
}

fn memories_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/memories", post(remember))
        .route("/api/v1/memories/search", get(search_memories))
        .route("/api/v1/memories/context", post(memory_context))
}

// =============================================================================
// Errors
// =============================================================================

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::Config(reason) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED", reason)
            }
            Error::Generation(_) => Self::new(StatusCode::BAD_GATEWAY, "GENERATION_FAILED", message),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// =============================================================================
// Root handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Document handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct DocumentBody {
    title: String,
    content: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// GET /api/v1/documents
async fn list_documents(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.load_documents().await)
}

/// POST /api/v1/documents
async fn create_document(
    State(state): State<AppState>,
    Json(body): Json<DocumentBody>,
) -> ApiResult<impl IntoResponse> {
    if body.content.trim().is_empty() {
        return Err(ApiError::bad_request("Document content is empty"));
    }
    let document = state
        .service
        .save_document(&body.title, &body.content, body.tags)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /api/v1/documents/:id
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state
        .service
        .get_document(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Document '{}' not found", id)))
}

/// PUT /api/v1/documents/:id
async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DocumentBody>,
) -> ApiResult<impl IntoResponse> {
    state
        .service
        .update_document(&id, &body.title, &body.content)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Document '{}' not found", id)))
}

/// DELETE /api/v1/documents/:id
async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_document(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Insight handlers
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FollowUpBody {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// GET /api/v1/documents/:id/insights
async fn list_insights(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    Json(state.service.load_insights_for_document(&id).await)
}

/// POST /api/v1/documents/:id/insights
async fn generate_insight(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<GenerateBody>>,
) -> ApiResult<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let insight = state
        .service
        .analyze_document(&id, body.user_id.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Document '{}' not found", id)))?;
    Ok((StatusCode::CREATED, Json(insight)))
}

/// POST /api/v1/documents/:id/insights/sync
async fn sync_insights(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.sync_insights(&id).await?))
}

/// GET /api/v1/insights/:id
async fn get_insight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state
        .service
        .get_insight(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Insight '{}' not found", id)))
}

/// POST /api/v1/insights/:id/follow-up
async fn follow_up(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<FollowUpBody>>,
) -> ApiResult<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let insight = state
        .service
        .follow_up(&id, body.prompt, body.user_id.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Insight '{}' not found", id)))?;
    Ok((StatusCode::CREATED, Json(insight)))
}

/// DELETE /api/v1/insights/:id
async fn delete_insight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_insight(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Memory handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct RememberBody {
    content: String,
    user_id: String,
}

#[derive(Debug, Serialize)]
struct RememberResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    user_id: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ContextBody {
    content: String,
    user_id: String,
    max_memories: Option<usize>,
}

/// POST /api/v1/memories
async fn remember(
    State(state): State<AppState>,
    Json(body): Json<RememberBody>,
) -> ApiResult<impl IntoResponse> {
    if body.content.trim().is_empty() {
        return Err(ApiError::bad_request("Memory content is empty"));
    }
    let id = state.service.remember(&body.content, &body.user_id).await;
    Ok((StatusCode::CREATED, Json(RememberResponse { id })))
}

/// GET /api/v1/memories/search
async fn search_memories(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_MEMORY_LIMIT);
    Json(
        state
            .service
            .search_memories(&query.q, &query.user_id, limit)
            .await,
    )
}

/// POST /api/v1/memories/context
async fn memory_context(
    State(state): State<AppState>,
    Json(body): Json<ContextBody>,
) -> impl IntoResponse {
    let max = body.max_memories.unwrap_or(DEFAULT_MEMORY_LIMIT);
    Json(
        state
            .service
            .get_memory_context(&body.content, &body.user_id, max)
            .await,
    )
}

// =============================================================================
// CORS
// =============================================================================

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}
