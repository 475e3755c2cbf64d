//! Wire types for the HTTP API and the live event feed.
//!
//! Everything here is camelCase JSON. Public projections never carry session
//! ids; the only place a session id leaves the server is the caller's own
//! [`UserView`].

use crate::error::{StormError, StormResult};
use crate::session::{IdeaTally, StormDescription, VoteComment};
use crate::types::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StormView {
    /// Join code, doubles as the storm id
    pub code: StormId,
    pub title: String,
    pub description: String,
    pub status: StormStatus,
    pub token_budget: TokenBudget,
    pub ideation_time_limit: Option<u32>,
    pub voting_time_limit: Option<u32>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub ideas: Vec<IdeaView>,
    pub votes: Vec<VoteView>,
    pub participants: Vec<ParticipantView>,
    /// Distinct users who submitted an idea or cast a vote
    pub participant_count: usize,
}

impl From<&StormDescription> for StormView {
    fn from(d: &StormDescription) -> Self {
        let storm = &d.storm;
        Self {
            code: storm.id.clone(),
            title: storm.title.clone(),
            description: storm.description.clone(),
            status: storm.status,
            token_budget: storm.token_budget,
            ideation_time_limit: storm.ideation_time_limit,
            voting_time_limit: storm.voting_time_limit,
            expires_at: storm.expires_at.clone(),
            created_at: storm.created_at.clone(),
            updated_at: storm.updated_at.clone(),
            ideas: d.ideas.iter().map(IdeaView::from).collect(),
            votes: d.votes.iter().map(VoteView::from).collect(),
            participants: d.participants.iter().map(ParticipantView::from).collect(),
            participant_count: d.participant_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdeaView {
    pub id: IdeaId,
    pub storm_id: StormId,
    pub author_username: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Idea> for IdeaView {
    fn from(idea: &Idea) -> Self {
        Self {
            id: idea.id.clone(),
            storm_id: idea.storm_id.clone(),
            author_username: idea.author_username.clone(),
            title: idea.title.clone(),
            description: idea.description.clone(),
            created_at: idea.created_at.clone(),
            updated_at: idea.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteView {
    pub id: VoteId,
    pub idea_id: IdeaId,
    pub blue_tokens: u32,
    pub red_tokens: u32,
    pub comment: String,
    pub created_at: String,
}

impl From<&Vote> for VoteView {
    fn from(vote: &Vote) -> Self {
        Self {
            id: vote.id.clone(),
            idea_id: vote.idea_id.clone(),
            blue_tokens: vote.blue_tokens,
            red_tokens: vote.red_tokens,
            comment: vote.comment.clone(),
            created_at: vote.created_at.clone(),
        }
    }
}

/// Another member of a storm as everyone sees them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub username: String,
    pub role: Role,
    pub joined_at: String,
}

impl From<&Participant> for ParticipantView {
    fn from(p: &Participant) -> Self {
        Self {
            username: p.username.clone(),
            role: p.role,
            joined_at: p.created_at.clone(),
        }
    }
}

/// The caller's own identity. `sessionId` goes into the `X-Storm-Session` header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub session_id: SessionId,
    pub username: String,
    pub storm_id: StormId,
    pub role: Role,
}

impl From<&Participant> for UserView {
    fn from(p: &Participant) -> Self {
        Self {
            session_id: p.session_id.clone(),
            username: p.username.clone(),
            storm_id: p.storm_id.clone(),
            role: p.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub username: String,
    pub comment: String,
    pub blue_tokens: u32,
    pub red_tokens: u32,
}

impl From<&VoteComment> for CommentView {
    fn from(c: &VoteComment) -> Self {
        Self {
            username: c.username.clone(),
            comment: c.comment.clone(),
            blue_tokens: c.blue_tokens,
            red_tokens: c.red_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdeaResultView {
    pub idea: IdeaView,
    pub blue_score: u64,
    pub red_score: u64,
    pub net_score: i64,
    pub comments: Vec<CommentView>,
}

impl From<&IdeaTally> for IdeaResultView {
    fn from(t: &IdeaTally) -> Self {
        Self {
            idea: (&t.idea).into(),
            blue_score: t.blue_score,
            red_score: t.red_score,
            net_score: t.net_score,
            comments: t.comments.iter().map(CommentView::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn required(value: &str, field: &str) -> StormResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StormError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn positive_minutes(value: Option<u32>, field: &str) -> StormResult<Option<u32>> {
    match value {
        Some(0) => Err(StormError::ValidationError(format!(
            "{} must be greater than zero",
            field
        ))),
        other => Ok(other),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStormRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub blue_tokens: Option<u32>,
    pub red_tokens: Option<u32>,
    pub ideation_time_limit: Option<u32>,
    pub voting_time_limit: Option<u32>,
}

impl CreateStormRequest {
    /// Validate and fill missing token limits from `defaults`
    pub fn into_draft(self, defaults: TokenBudget) -> StormResult<StormDraft> {
        Ok(StormDraft {
            title: required(&self.title, "title")?,
            description: self.description.trim().to_string(),
            token_budget: Some(TokenBudget {
                max_blue: self.blue_tokens.unwrap_or(defaults.max_blue),
                max_red: self.red_tokens.unwrap_or(defaults.max_red),
            }),
            ideation_time_limit: positive_minutes(
                self.ideation_time_limit,
                "ideationTimeLimit",
            )?,
            voting_time_limit: positive_minutes(self.voting_time_limit, "votingTimeLimit")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub username: String,
}

impl JoinRequest {
    pub fn into_username(self) -> StormResult<String> {
        required(&self.username, "username")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdeaRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl IdeaRequest {
    pub fn into_draft(self) -> StormResult<IdeaDraft> {
        Ok(IdeaDraft {
            title: required(&self.title, "title")?,
            description: self.description.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdeaPatchRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl IdeaPatchRequest {
    pub fn into_patch(self) -> StormResult<IdeaPatch> {
        let title = match self.title {
            Some(title) => Some(required(&title, "title")?),
            None => None,
        };
        Ok(IdeaPatch {
            title,
            description: self.description.map(|d| d.trim().to_string()),
        })
    }
}

/// Token allocation; omitted colors count as zero
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub blue_tokens: u32,
    #[serde(default)]
    pub red_tokens: u32,
    #[serde(default)]
    pub comment: String,
}

impl From<VoteRequest> for Ballot {
    fn from(r: VoteRequest) -> Self {
        Ballot {
            blue_tokens: r.blue_tokens,
            red_tokens: r.red_tokens,
            comment: r.comment,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListStormsQuery {
    pub status: Option<StormStatus>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StormWithUser {
    pub storm: StormView,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: UserView,
    pub storm: StormView,
    pub tokens: TokenSpend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Live events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StormEvent {
    /// First message on every socket
    Welcome {
        storm: StormView,
    },
    ParticipantJoined {
        storm_id: StormId,
        participant: ParticipantView,
    },
    IdeaSubmitted {
        storm_id: StormId,
        idea: IdeaView,
    },
    IdeaUpdated {
        storm_id: StormId,
        idea: IdeaView,
    },
    IdeaDeleted {
        storm_id: StormId,
        idea_id: IdeaId,
    },
    VoteCast {
        storm_id: StormId,
        vote: VoteView,
    },
    PhaseAdvanced {
        storm_id: StormId,
        status: StormStatus,
    },
    StormDeleted {
        storm_id: StormId,
    },
}

impl StormEvent {
    pub fn storm_id(&self) -> &str {
        match self {
            StormEvent::Welcome { storm } => &storm.code,
            StormEvent::ParticipantJoined { storm_id, .. }
            | StormEvent::IdeaSubmitted { storm_id, .. }
            | StormEvent::IdeaUpdated { storm_id, .. }
            | StormEvent::IdeaDeleted { storm_id, .. }
            | StormEvent::VoteCast { storm_id, .. }
            | StormEvent::PhaseAdvanced { storm_id, .. }
            | StormEvent::StormDeleted { storm_id } => storm_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn participant() -> Participant {
        Participant {
            session_id: "session-secret".to_string(),
            username: "alice".to_string(),
            storm_id: "STORM-ABC123".to_string(),
            role: Role::Participant,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = StormEvent::IdeaDeleted {
            storm_id: "STORM-ABC123".to_string(),
            idea_id: "idea-1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "t": "idea_deleted", "stormId": "STORM-ABC123", "ideaId": "idea-1" })
        );

        let event = StormEvent::PhaseAdvanced {
            storm_id: "STORM-ABC123".to_string(),
            status: StormStatus::Voting,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["t"], "phase_advanced");
        assert_eq!(value["status"], "voting");
        assert_eq!(event.storm_id(), "STORM-ABC123");
    }

    #[test]
    fn test_participant_view_hides_session_id() {
        let value = serde_json::to_value(ParticipantView::from(&participant())).unwrap();
        assert_eq!(
            value,
            json!({ "username": "alice", "role": "participant", "joinedAt": "2026-01-01T00:00:00Z" })
        );

        let user = serde_json::to_value(UserView::from(&participant())).unwrap();
        assert_eq!(user["sessionId"], "session-secret");
        assert_eq!(user["stormId"], "STORM-ABC123");
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateStormRequest =
            serde_json::from_value(json!({ "title": "  Offsite  ", "blueTokens": 8 })).unwrap();
        let draft = req.into_draft(TokenBudget::default()).unwrap();
        assert_eq!(draft.title, "Offsite");
        assert_eq!(draft.description, "");
        assert_eq!(
            draft.token_budget,
            Some(TokenBudget {
                max_blue: 8,
                max_red: 3
            })
        );
    }

    #[test]
    fn test_create_request_validation() {
        let blank: CreateStormRequest = serde_json::from_value(json!({ "title": "   " })).unwrap();
        assert!(matches!(
            blank.into_draft(TokenBudget::default()),
            Err(StormError::ValidationError(_))
        ));

        let zero: CreateStormRequest =
            serde_json::from_value(json!({ "title": "Ok", "votingTimeLimit": 0 })).unwrap();
        assert!(matches!(
            zero.into_draft(TokenBudget::default()),
            Err(StormError::ValidationError(_))
        ));
    }

    #[test]
    fn test_idea_requests() {
        let req = IdeaRequest {
            title: "".to_string(),
            description: "words".to_string(),
        };
        assert!(req.into_draft().is_err());

        let patch = IdeaPatchRequest {
            title: None,
            description: Some(" new ".to_string()),
        }
        .into_patch()
        .unwrap();
        assert_eq!(patch.title, None);
        assert_eq!(patch.description.as_deref(), Some("new"));

        let blank_title = IdeaPatchRequest {
            title: Some(" ".to_string()),
            description: None,
        };
        assert!(blank_title.into_patch().is_err());
    }

    #[test]
    fn test_vote_request_defaults_to_zero() {
        let req: VoteRequest = serde_json::from_value(json!({ "redTokens": 2 })).unwrap();
        let ballot = Ballot::from(req);
        assert_eq!(ballot.blue_tokens, 0);
        assert_eq!(ballot.red_tokens, 2);
        assert_eq!(ballot.comment, "");
    }
}
