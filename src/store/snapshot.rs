//! Serializable snapshot of the whole store.
//!
//! Used to persist the in-memory store to disk and to load it back on startup.

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema version for snapshot format compatibility
/// Version 1: storms, ideas, votes, participants
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub schema_version: u32,
    /// Snapshot timestamp (RFC 3339)
    pub saved_at: String,
    pub storms: HashMap<StormId, Storm>,
    pub ideas: HashMap<IdeaId, Idea>,
    pub votes: HashMap<VoteId, Vote>,
    pub participants: HashMap<SessionId, Participant>,
}

impl StoreSnapshot {
    pub fn new(
        storms: HashMap<StormId, Storm>,
        ideas: HashMap<IdeaId, Idea>,
        votes: HashMap<VoteId, Vote>,
        participants: HashMap<SessionId, Participant>,
    ) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            storms,
            ideas,
            votes,
            participants,
        }
    }

    /// Check version and referential integrity before loading
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(format!(
                "Snapshot schema version {} is newer than supported version {}",
                self.schema_version, SNAPSHOT_SCHEMA_VERSION
            ));
        }

        for (storm_id, storm) in &self.storms {
            if !self.participants.contains_key(&storm.moderator_id) {
                return Err(format!(
                    "Storm '{}' references moderator '{}' which doesn't exist",
                    storm_id, storm.moderator_id
                ));
            }
        }

        for (idea_id, idea) in &self.ideas {
            if !self.storms.contains_key(&idea.storm_id) {
                return Err(format!(
                    "Idea '{}' references storm '{}' which doesn't exist",
                    idea_id, idea.storm_id
                ));
            }
        }

        for (vote_id, vote) in &self.votes {
            let Some(idea) = self.ideas.get(&vote.idea_id) else {
                return Err(format!(
                    "Vote '{}' references idea '{}' which doesn't exist",
                    vote_id, vote.idea_id
                ));
            };
            if idea.storm_id != vote.storm_id {
                return Err(format!(
                    "Vote '{}' is filed under storm '{}' but its idea belongs to '{}'",
                    vote_id, vote.storm_id, idea.storm_id
                ));
            }
        }

        for (session_id, participant) in &self.participants {
            if !self.storms.contains_key(&participant.storm_id) {
                return Err(format!(
                    "Participant '{}' references storm '{}' which doesn't exist",
                    session_id, participant.storm_id
                ));
            }
        }

        Ok(())
    }
}
