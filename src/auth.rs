//! Caller identity for API routes.
//!
//! Participants are anonymous: the session id handed out when creating or
//! joining a storm is the only credential, sent back in `X-Storm-Session`.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use std::sync::Arc;

use crate::api::ApiError;
use crate::state::AppState;
use crate::types::Participant;

pub const SESSION_HEADER: &str = "x-storm-session";

/// Session id from the request headers, if present and non-blank
pub fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The participant making the request. Rejects with 401 when the header is
/// missing or names no known session.
#[derive(Debug, Clone)]
pub struct Actor(pub Participant);

impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(session_id) = session_header(&parts.headers) else {
            return Err(ApiError::Unauthenticated);
        };

        match state.participant(session_id).await? {
            Some(participant) => Ok(Actor(participant)),
            None => {
                tracing::warn!("Rejected unknown session id");
                Err(ApiError::Unauthenticated)
            }
        }
    }
}
