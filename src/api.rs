//! HTTP API endpoints.
//!
//! Handlers translate JSON requests into [`AppState`] operations and map
//! [`StormError`]s onto status codes. All error bodies are `{"error": "..."}`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::Actor;
use crate::error::StormError;
use crate::protocol::*;
use crate::state::AppState;
use crate::ws;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing or unknown session")]
    Unauthenticated,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Storm(#[from] StormError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storm(e) => match e {
                StormError::InvalidPhase { .. }
                | StormError::ValidationError(_)
                | StormError::BudgetExceeded { .. }
                | StormError::TerminalPhase => StatusCode::BAD_REQUEST,
                StormError::Forbidden(_) => StatusCode::FORBIDDEN,
                StormError::NotFound { .. } => StatusCode::NOT_FOUND,
                StormError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else if let ApiError::Storm(e) = &self {
            tracing::warn!(code = e.code(), "Request rejected: {}", e);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/storms", get(list_storms).post(create_storm))
        .route("/api/storms/{id}", get(get_storm).delete(delete_storm))
        .route("/api/storms/{id}/join", post(join_storm))
        .route("/api/storms/{id}/ideas", post(submit_idea))
        .route("/api/storms/{id}/advance-phase", post(advance_phase))
        .route("/api/storms/{id}/results", get(results))
        .route("/api/storms/{id}/ws", get(ws::ws_handler))
        .route("/api/ideas/{id}", put(update_idea).delete(delete_idea))
        .route("/api/ideas/{id}/vote", get(my_vote).post(cast_vote))
        .route("/api/session", get(current_session).delete(end_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// GET /api/storms?status=
async fn list_storms(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListStormsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<StormView>>> {
    let Query(query) = query?;
    let storms = state.list_storms(query.status).await?;
    Ok(Json(storms.iter().map(StormView::from).collect()))
}

/// POST /api/storms
///
/// Creates the storm together with its moderator. The returned `user` carries
/// the moderator's session id.
async fn create_storm(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateStormRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StormWithUser>)> {
    let Json(req) = payload?;
    let draft = req.into_draft(state.config.default_budget)?;
    let (description, moderator) = state.create_storm(draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(StormWithUser {
            storm: (&description).into(),
            user: (&moderator).into(),
        }),
    ))
}

/// GET /api/storms/{id}
async fn get_storm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StormView>> {
    let description = state.describe_storm(&id).await?;
    Ok(Json((&description).into()))
}

/// DELETE /api/storms/{id}
async fn delete_storm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> ApiResult<StatusCode> {
    state.delete_storm(&id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/storms/{id}/join
async fn join_storm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> ApiResult<Json<StormWithUser>> {
    let Json(req) = payload?;
    let username = req.into_username()?;
    let (description, participant) = state.join_storm(&id, username).await?;
    Ok(Json(StormWithUser {
        storm: (&description).into(),
        user: (&participant).into(),
    }))
}

/// POST /api/storms/{id}/ideas
async fn submit_idea(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    payload: Result<Json<IdeaRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IdeaView>)> {
    let Json(req) = payload?;
    let idea = state.submit_idea(&id, &actor, req.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json((&idea).into())))
}

/// PUT /api/ideas/{id}
async fn update_idea(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    payload: Result<Json<IdeaPatchRequest>, JsonRejection>,
) -> ApiResult<Json<IdeaView>> {
    let Json(req) = payload?;
    let idea = state.update_idea(&id, &actor, req.into_patch()?).await?;
    Ok(Json((&idea).into()))
}

/// DELETE /api/ideas/{id}
async fn delete_idea(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> ApiResult<StatusCode> {
    state.delete_idea(&id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/ideas/{id}/vote
async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<VoteView>)> {
    let Json(req) = payload?;
    let vote = state.cast_vote(&id, &actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json((&vote).into())))
}

/// GET /api/ideas/{id}/vote
async fn my_vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> ApiResult<Json<VoteView>> {
    let vote = state.vote_of(&id, &actor).await?;
    Ok(Json((&vote).into()))
}

/// POST /api/storms/{id}/advance-phase
async fn advance_phase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> ApiResult<Json<StormView>> {
    let description = state.advance_phase(&id, &actor).await?;
    Ok(Json((&description).into()))
}

/// GET /api/storms/{id}/results
async fn results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<IdeaResultView>>> {
    let tally = state.results(&id).await?;
    Ok(Json(tally.iter().map(IdeaResultView::from).collect()))
}

/// GET /api/session
async fn current_session(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
) -> ApiResult<Json<SessionResponse>> {
    let description = state.describe_storm(&actor.storm_id).await?;
    let tokens = state.token_spend(&actor).await?;
    Ok(Json(SessionResponse {
        user: (&actor).into(),
        storm: (&description).into(),
        tokens,
    }))
}

/// DELETE /api/session
///
/// Identity lives in a request header, so there is nothing to clear here. The
/// participant record stays so their ideas and votes keep their username.
async fn end_session(Actor(actor): Actor) -> StatusCode {
    tracing::info!(storm_id = %actor.storm_id, "Session ended by client");
    StatusCode::NO_CONTENT
}
