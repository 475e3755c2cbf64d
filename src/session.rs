//! Phase state machine and token ledger for a single storm.
//!
//! A `StormSession` is built from a snapshot of one storm together with its
//! ideas and votes. Each operation validates the request completely before it
//! touches the snapshot, so a failed operation leaves the session unchanged.
//! Persisting the outcome is the caller's job.

use crate::error::{StormError, StormResult, TokenColor};
use crate::types::*;
use std::collections::HashSet;
use std::sync::Mutex;
use ulid::{Generator, Ulid};

/// Shared so ids minted within the same millisecond still sort in creation order
static ID_GENERATOR: Mutex<Generator> = Mutex::new(Generator::new());

/// A ULID that sorts after every id this process handed out before it
pub(crate) fn next_id() -> String {
    let mut generator = ID_GENERATOR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    // Only fails when the random part overflows within one millisecond
    generator.generate().unwrap_or_else(|_| Ulid::new()).to_string()
}

fn net_score(blue: u64, red: u64) -> i64 {
    let blue = i64::try_from(blue).unwrap_or(i64::MAX);
    let red = i64::try_from(red).unwrap_or(i64::MAX);
    blue.saturating_sub(red)
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Outcome of a successful vote: the stored vote and the one it replaced, if any
#[derive(Debug, Clone)]
pub struct CastVote {
    pub vote: Vote,
    pub replaced: Option<Vote>,
}

/// An idea removed from the storm together with the votes that referenced it
#[derive(Debug, Clone)]
pub struct RemovedIdea {
    pub idea: Idea,
    pub votes: Vec<Vote>,
}

/// Read-only projection of a storm
#[derive(Debug, Clone)]
pub struct StormDescription {
    pub storm: Storm,
    pub ideas: Vec<Idea>,
    pub votes: Vec<Vote>,
    pub participants: Vec<Participant>,
    /// Distinct users who authored an idea or cast a vote
    pub participant_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteComment {
    pub username: String,
    pub comment: String,
    pub blue_tokens: u32,
    pub red_tokens: u32,
}

/// Final score of one idea
#[derive(Debug, Clone)]
pub struct IdeaTally {
    pub idea: Idea,
    pub blue_score: u64,
    pub red_score: u64,
    pub net_score: i64,
    pub comments: Vec<VoteComment>,
}

#[derive(Debug, Clone)]
pub struct StormSession {
    storm: Storm,
    ideas: Vec<Idea>,
    votes: Vec<Vote>,
}

impl StormSession {
    /// Build a session from the storm and the ideas/votes that belong to it.
    /// Entities owned by other storms are ignored.
    pub fn new(storm: Storm, ideas: Vec<Idea>, votes: Vec<Vote>) -> Self {
        let mut ideas: Vec<Idea> = ideas.into_iter().filter(|i| i.storm_id == storm.id).collect();
        // Ids are monotonic ULIDs, so id order is submission order
        ideas.sort_by(|a, b| a.id.cmp(&b.id));
        let votes = votes.into_iter().filter(|v| v.storm_id == storm.id).collect();
        Self {
            storm,
            ideas,
            votes,
        }
    }

    pub fn storm(&self) -> &Storm {
        &self.storm
    }

    pub fn ideas(&self) -> &[Idea] {
        &self.ideas
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn into_parts(self) -> (Storm, Vec<Idea>, Vec<Vote>) {
        (self.storm, self.ideas, self.votes)
    }

    fn require_phase(&self, expected: StormStatus) -> StormResult<()> {
        if self.storm.status != expected {
            return Err(StormError::InvalidPhase {
                expected,
                actual: self.storm.status,
            });
        }
        Ok(())
    }

    fn idea_index(&self, idea_id: &str) -> StormResult<usize> {
        self.ideas
            .iter()
            .position(|i| i.id == idea_id)
            .ok_or_else(|| StormError::not_found("Idea", idea_id))
    }

    /// Submit a new idea authored by `actor`
    pub fn submit_idea(&mut self, actor: &Participant, draft: IdeaDraft) -> StormResult<Idea> {
        self.require_phase(StormStatus::Ideation)?;

        let ts = now();
        let idea = Idea {
            id: next_id(),
            storm_id: self.storm.id.clone(),
            author_id: actor.session_id.clone(),
            author_username: actor.username.clone(),
            title: draft.title,
            description: draft.description,
            created_at: ts.clone(),
            updated_at: ts,
        };
        self.ideas.push(idea.clone());
        Ok(idea)
    }

    /// Apply a partial update to an idea. Only the author may edit, and only
    /// during ideation.
    pub fn update_idea(
        &mut self,
        idea_id: &str,
        actor_id: &str,
        patch: IdeaPatch,
    ) -> StormResult<Idea> {
        let index = self.idea_index(idea_id)?;
        if self.ideas[index].author_id != actor_id {
            return Err(StormError::Forbidden(
                "only the author can edit this idea".to_string(),
            ));
        }
        self.require_phase(StormStatus::Ideation)?;

        let idea = &mut self.ideas[index];
        if let Some(title) = patch.title {
            idea.title = title;
        }
        if let Some(description) = patch.description {
            idea.description = description;
        }
        idea.updated_at = now();
        Ok(idea.clone())
    }

    /// Remove an idea. Allowed for its author and for the storm's moderator,
    /// only during ideation. Votes on the idea go with it.
    pub fn delete_idea(&mut self, idea_id: &str, actor: &Participant) -> StormResult<RemovedIdea> {
        let index = self.idea_index(idea_id)?;
        let is_author = self.ideas[index].author_id == actor.session_id;
        if !is_author && !actor.is_moderator_of(&self.storm) {
            return Err(StormError::Forbidden(
                "only the author or the moderator can delete this idea".to_string(),
            ));
        }
        self.require_phase(StormStatus::Ideation)?;

        let idea = self.ideas.remove(index);
        let (votes, kept): (Vec<Vote>, Vec<Vote>) = std::mem::take(&mut self.votes)
            .into_iter()
            .partition(|v| v.idea_id == idea.id);
        self.votes = kept;
        Ok(RemovedIdea { idea, votes })
    }

    /// Blue and red tokens `user_id` has spent, optionally ignoring their vote
    /// on one idea (the one about to be replaced)
    fn spent(&self, user_id: &str, excluding_idea: Option<&str>) -> (u64, u64) {
        self.votes
            .iter()
            .filter(|v| v.user_id == user_id)
            .filter(|v| Some(v.idea_id.as_str()) != excluding_idea)
            .fold((0, 0), |(blue, red), v| {
                (blue + u64::from(v.blue_tokens), red + u64::from(v.red_tokens))
            })
    }

    fn check_budget(color: TokenColor, max: u32, spent: u64, requested: u32) -> StormResult<()> {
        let remaining = u64::from(max).saturating_sub(spent);
        if u64::from(requested) > remaining {
            return Err(StormError::BudgetExceeded {
                color,
                requested,
                remaining: remaining as u32,
            });
        }
        Ok(())
    }

    /// Spend tokens on an idea. A user holds at most one vote per idea; voting
    /// again replaces the earlier vote instead of adding to it.
    pub fn cast_vote(&mut self, idea_id: &str, actor_id: &str, ballot: Ballot) -> StormResult<CastVote> {
        let index = self.idea_index(idea_id)?;
        self.require_phase(StormStatus::Voting)?;

        if ballot.comment.trim().is_empty() {
            return Err(StormError::ValidationError(
                "Comment is required".to_string(),
            ));
        }
        if ballot.blue_tokens > 0 && ballot.red_tokens > 0 {
            return Err(StormError::ValidationError(
                "Cannot use both blue and red tokens on the same idea".to_string(),
            ));
        }

        let idea_id = self.ideas[index].id.clone();
        let (spent_blue, spent_red) = self.spent(actor_id, Some(&idea_id));
        let budget = self.storm.token_budget;
        Self::check_budget(TokenColor::Blue, budget.max_blue, spent_blue, ballot.blue_tokens)?;
        Self::check_budget(TokenColor::Red, budget.max_red, spent_red, ballot.red_tokens)?;

        let replaced = self
            .votes
            .iter()
            .position(|v| v.user_id == actor_id && v.idea_id == idea_id)
            .map(|i| self.votes.remove(i));

        let vote = Vote {
            id: next_id(),
            idea_id,
            storm_id: self.storm.id.clone(),
            user_id: actor_id.to_string(),
            blue_tokens: ballot.blue_tokens,
            red_tokens: ballot.red_tokens,
            comment: ballot.comment,
            created_at: now(),
        };
        self.votes.push(vote.clone());
        Ok(CastVote { vote, replaced })
    }

    /// Move the storm to its next phase. Moderator only.
    pub fn advance_phase(&mut self, actor: &Participant) -> StormResult<StormStatus> {
        if !actor.is_moderator_of(&self.storm) {
            return Err(StormError::Forbidden(
                "only the moderator can advance the phase".to_string(),
            ));
        }
        let next = self.storm.status.next().ok_or(StormError::TerminalPhase)?;

        self.storm.status = next;
        self.storm.updated_at = now();
        Ok(next)
    }

    /// Tokens spent and remaining for a user
    pub fn token_spend(&self, user_id: &str) -> TokenSpend {
        let (blue, red) = self.spent(user_id, None);
        let budget = self.storm.token_budget;
        let spent_blue = u32::try_from(blue).unwrap_or(u32::MAX);
        let spent_red = u32::try_from(red).unwrap_or(u32::MAX);
        TokenSpend {
            spent_blue,
            spent_red,
            remaining_blue: budget.max_blue.saturating_sub(spent_blue),
            remaining_red: budget.max_red.saturating_sub(spent_red),
        }
    }

    pub fn describe(&self, participants: &[Participant]) -> StormDescription {
        let contributors: HashSet<&str> = self
            .ideas
            .iter()
            .map(|i| i.author_id.as_str())
            .chain(self.votes.iter().map(|v| v.user_id.as_str()))
            .collect();

        StormDescription {
            storm: self.storm.clone(),
            ideas: self.ideas.clone(),
            votes: self.votes.clone(),
            participants: participants
                .iter()
                .filter(|p| p.storm_id == self.storm.id)
                .cloned()
                .collect(),
            participant_count: contributors.len(),
        }
    }

    /// Score every idea (net = blue - red) and rank them, best first.
    /// Equal scores keep submission order.
    pub fn tally(&self, participants: &[Participant]) -> Vec<IdeaTally> {
        let username_of = |user_id: &str| {
            participants
                .iter()
                .find(|p| p.session_id == user_id)
                .map(|p| p.username.clone())
                .unwrap_or_else(|| "Anonymous".to_string())
        };

        let mut tallies: Vec<IdeaTally> = self
            .ideas
            .iter()
            .map(|idea| {
                let votes: Vec<&Vote> = self.votes.iter().filter(|v| v.idea_id == idea.id).collect();
                let blue_score: u64 = votes.iter().map(|v| u64::from(v.blue_tokens)).sum();
                let red_score: u64 = votes.iter().map(|v| u64::from(v.red_tokens)).sum();
                IdeaTally {
                    idea: idea.clone(),
                    blue_score,
                    red_score,
                    net_score: net_score(blue_score, red_score),
                    comments: votes
                        .iter()
                        .map(|v| VoteComment {
                            username: username_of(&v.user_id),
                            comment: v.comment.clone(),
                            blue_tokens: v.blue_tokens,
                            red_tokens: v.red_tokens,
                        })
                        .collect(),
                }
            })
            .collect();

        // sort_by is stable, so ties stay in submission order
        tallies.sort_by(|a, b| b.net_score.cmp(&a.net_score));
        tallies
    }
}
