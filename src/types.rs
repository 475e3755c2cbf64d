use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type StormId = String;
pub type IdeaId = String;
pub type VoteId = String;
pub type SessionId = String;

/// Default token budget for storms created without explicit limits
pub const DEFAULT_MAX_BLUE: u32 = 5;
pub const DEFAULT_MAX_RED: u32 = 3;

/// Display name given to the moderator participant created with a storm
pub const MODERATOR_USERNAME: &str = "Moderator";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StormStatus {
    Ideation,
    Voting,
    Results,
}

impl StormStatus {
    /// The phase that follows this one, or None for the terminal phase
    pub fn next(self) -> Option<StormStatus> {
        match self {
            StormStatus::Ideation => Some(StormStatus::Voting),
            StormStatus::Voting => Some(StormStatus::Results),
            StormStatus::Results => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StormStatus::Ideation => "ideation",
            StormStatus::Voting => "voting",
            StormStatus::Results => "results",
        }
    }
}

impl std::fmt::Display for StormStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBudget {
    pub max_blue: u32,
    pub max_red: u32,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_blue: DEFAULT_MAX_BLUE,
            max_red: DEFAULT_MAX_RED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Storm {
    pub id: StormId,
    pub title: String,
    pub description: String,
    pub status: StormStatus,
    pub token_budget: TokenBudget,
    pub moderator_id: SessionId,
    /// Minutes; stored for display only, phases never advance on their own
    pub ideation_time_limit: Option<u32>,
    pub voting_time_limit: Option<u32>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Idea {
    pub id: IdeaId,
    pub storm_id: StormId,
    pub author_id: SessionId,
    /// Author's username at the time the idea was submitted
    pub author_username: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub id: VoteId,
    pub idea_id: IdeaId,
    pub storm_id: StormId,
    pub user_id: SessionId,
    pub blue_tokens: u32,
    pub red_tokens: u32,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Participant,
    Moderator,
}

/// An anonymous member of a storm, identified by their session id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub session_id: SessionId,
    pub username: String,
    pub storm_id: StormId,
    pub role: Role,
    pub created_at: String,
}

impl Participant {
    pub fn is_moderator_of(&self, storm: &Storm) -> bool {
        self.role == Role::Moderator && self.session_id == storm.moderator_id
    }
}

/// Settings for a new storm. A missing budget falls back to the configured default.
#[derive(Debug, Clone, Default)]
pub struct StormDraft {
    pub title: String,
    pub description: String,
    pub token_budget: Option<TokenBudget>,
    pub ideation_time_limit: Option<u32>,
    pub voting_time_limit: Option<u32>,
}

/// Fields accepted when submitting a new idea
#[derive(Debug, Clone)]
pub struct IdeaDraft {
    pub title: String,
    pub description: String,
}

/// Partial update of an idea; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct IdeaPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A token allocation on a single idea
#[derive(Debug, Clone)]
pub struct Ballot {
    pub blue_tokens: u32,
    pub red_tokens: u32,
    pub comment: String,
}

/// Tokens a user has spent in a storm and what remains of the budget
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenSpend {
    pub spent_blue: u32,
    pub spent_red: u32,
    pub remaining_blue: u32,
    pub remaining_red: u32,
}
