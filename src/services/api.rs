//! REST API routes.
//!
//! Thin handlers: decode the request, call the assignment engine or team
//! directory under the configured deadline, encode the result. All business
//! rules live below this layer.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{
    NewPullRequest, NewTeam, NewUser, PullRequest, PullRequestShort, ReviewStatistics, Team, User,
};
use crate::services::assignment::{with_deadline, AssignmentEngine};
use crate::services::directory;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the axum routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: AssignmentEngine,
    /// Deadline applied to every engine and directory call.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(pool: DbPool, request_timeout: Duration) -> Self {
        Self {
            engine: AssignmentEngine::new(pool),
            request_timeout,
        }
    }

    fn db(&self) -> &DbPool {
        self.engine.pool()
    }
}

// ── Error handling ───────────────────────────────────────────────────────────

/// JSON error body.
#[derive(Serialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

impl ApiErr {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::InactiveAuthor { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INACTIVE_AUTHOR")
            }
            AppError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
            AppError::NotAssigned { .. } => (StatusCode::CONFLICT, "NOT_ASSIGNED"),
            AppError::NoAvailableReviewer { .. } => (StatusCode::CONFLICT, "NO_AVAILABLE_REVIEWER"),
            AppError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::StoreUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
            }
            AppError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            AppError::Database { .. } | AppError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            log::error!("[api] {}: {}", code, self.0);
        } else {
            log::debug!("[api] {}: {}", code, self.0);
        }

        (
            status,
            Json(ApiError {
                code: code.to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

// ── Request/response types ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct SetActiveBody {
    user_id: String,
    is_active: bool,
}

#[derive(Deserialize)]
struct ReviewQuery {
    #[serde(alias = "reviewer_id")]
    user_id: String,
}

#[derive(Deserialize)]
struct MergeBody {
    pull_request_id: String,
}

#[derive(Deserialize)]
struct ReassignBody {
    pull_request_id: String,
    #[serde(alias = "old_reviewer_id")]
    old_user_id: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Users
        .route("/users", post(register_user_handler))
        .route("/users/set-is-active", post(set_user_active_handler))
        .route("/users/get-review", get(get_review_handler))
        .route("/users/{id}", get(get_user_handler))
        // Teams
        .route("/team/add", post(create_team_handler))
        .route("/team/{team_name}", get(get_team_handler))
        // Pull requests
        .route("/pull-request/create", post(create_pull_request_handler))
        .route("/pull-request/merge", post(merge_pull_request_handler))
        .route("/pull-request/reassign", post(reassign_reviewer_handler))
        .route("/pull-request/{id}", get(get_pull_request_handler))
        .route("/statistics", get(statistics_handler))
        .route("/health", get(health_handler))
}

/// Build the full application router with tracing and CORS layers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// ── User handlers ────────────────────────────────────────────────────────────

/// POST /api/v1/users: register or update a user.
async fn register_user_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiErr> {
    let Json(user) = payload?;
    let user = with_deadline(
        state.request_timeout,
        "register_user",
        directory::register_user(state.db(), &user),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/{id}
async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiErr> {
    let user = with_deadline(
        state.request_timeout,
        "get_user",
        directory::get_user(state.db(), &id),
    )
    .await?;

    Ok(Json(user))
}

/// POST /api/v1/users/set-is-active
async fn set_user_active_handler(
    State(state): State<AppState>,
    payload: Result<Json<SetActiveBody>, JsonRejection>,
) -> Result<Json<User>, ApiErr> {
    let Json(req) = payload?;
    let user = with_deadline(
        state.request_timeout,
        "set_user_active",
        directory::set_user_active(state.db(), &req.user_id, req.is_active),
    )
    .await?;

    Ok(Json(user))
}

/// GET /api/v1/users/get-review?user_id=X: pull requests the user reviews.
async fn get_review_handler(
    State(state): State<AppState>,
    query: Result<Query<ReviewQuery>, QueryRejection>,
) -> Result<Json<Vec<PullRequestShort>>, ApiErr> {
    let Query(params) = query?;
    let prs = with_deadline(
        state.request_timeout,
        "pull_requests_for_reviewer",
        state.engine.pull_requests_for_reviewer(&params.user_id),
    )
    .await?;

    Ok(Json(prs))
}

// ── Team handlers ────────────────────────────────────────────────────────────

/// POST /api/v1/team/add: create a team with its members.
async fn create_team_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewTeam>, JsonRejection>,
) -> Result<(StatusCode, Json<Team>), ApiErr> {
    let Json(team) = payload?;
    let team = with_deadline(
        state.request_timeout,
        "create_team",
        directory::create_team(state.db(), &team),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(team)))
}

/// GET /api/v1/team/{team_name}
async fn get_team_handler(
    State(state): State<AppState>,
    Path(team_name): Path<String>,
) -> Result<Json<Team>, ApiErr> {
    let team = with_deadline(
        state.request_timeout,
        "get_team",
        directory::get_team(state.db(), &team_name),
    )
    .await?;

    Ok(Json(team))
}

// ── Pull request handlers ────────────────────────────────────────────────────

/// POST /api/v1/pull-request/create: create a pull request and assign reviewers.
async fn create_pull_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewPullRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PullRequest>), ApiErr> {
    let Json(req) = payload?;
    let pr = with_deadline(
        state.request_timeout,
        "create_pull_request",
        state
            .engine
            .create_pull_request(&req.id, &req.title, &req.author_id),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(pr)))
}

/// POST /api/v1/pull-request/merge: idempotent merge.
///
/// The response body is read inside the merge transaction, so a 200 always
/// carries the committed state. Merging is idempotent: a client that got a
/// timeout can retry.
async fn merge_pull_request_handler(
    State(state): State<AppState>,
    payload: Result<Json<MergeBody>, JsonRejection>,
) -> Result<Json<PullRequest>, ApiErr> {
    let Json(req) = payload?;
    let pr = with_deadline(
        state.request_timeout,
        "merge_pull_request",
        state.engine.merge_pull_request(&req.pull_request_id),
    )
    .await?;

    Ok(Json(pr))
}

/// POST /api/v1/pull-request/reassign: replace one reviewer.
async fn reassign_reviewer_handler(
    State(state): State<AppState>,
    payload: Result<Json<ReassignBody>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiErr> {
    let Json(req) = payload?;
    with_deadline(
        state.request_timeout,
        "reassign_reviewer",
        state
            .engine
            .reassign_reviewer(&req.pull_request_id, &req.old_user_id),
    )
    .await?;

    Ok(Json(MessageResponse {
        message: "Reviewer reassigned successfully".to_string(),
    }))
}

/// GET /api/v1/pull-request/{id}
async fn get_pull_request_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PullRequest>, ApiErr> {
    let pr = with_deadline(
        state.request_timeout,
        "get_pull_request",
        state.engine.get_pull_request(&id),
    )
    .await?;

    Ok(Json(pr))
}

/// GET /api/v1/statistics
async fn statistics_handler(
    State(state): State<AppState>,
) -> Result<Json<ReviewStatistics>, ApiErr> {
    let stats = with_deadline(
        state.request_timeout,
        "statistics",
        state.engine.statistics(),
    )
    .await?;

    Ok(Json(stats))
}

/// GET /api/v1/health
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        ApiErr(err).status_and_code().0
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(AppError::not_found_with_id("User", "u1")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::invalid_input("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::inactive_author("u1")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(AppError::invalid_state("merged")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::not_assigned("pr", "u1")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::no_available_reviewer("pr", None)),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(AppError::conflict("dup")), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AppError::store_unavailable("down")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AppError::timeout("create")),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(AppError::database("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
