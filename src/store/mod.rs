//! Persistence for storms, ideas, votes and participants.
//!
//! The service layer talks to storage only through [`StormStore`]. Every write
//! must be durable before the future resolves.

mod memory;
mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::{StoreSnapshot, SNAPSHOT_SCHEMA_VERSION};

use crate::error::StormResult;
use crate::types::*;
use async_trait::async_trait;

#[async_trait]
pub trait StormStore: Send + Sync {
    // Storms
    async fn get_storm(&self, id: &str) -> StormResult<Option<Storm>>;
    /// Newest first, optionally filtered by status
    async fn list_storms(&self, status: Option<StormStatus>) -> StormResult<Vec<Storm>>;
    /// Store a new storm together with its moderator
    async fn insert_storm(&self, storm: Storm, moderator: Participant) -> StormResult<()>;
    async fn update_storm(&self, storm: Storm) -> StormResult<()>;
    /// Remove a storm along with its ideas, votes and participants
    async fn delete_storm(&self, id: &str) -> StormResult<()>;

    // Ideas
    async fn get_idea(&self, id: &str) -> StormResult<Option<Idea>>;
    async fn ideas_for_storm(&self, storm_id: &str) -> StormResult<Vec<Idea>>;
    async fn insert_idea(&self, idea: Idea) -> StormResult<()>;
    async fn update_idea(&self, idea: Idea) -> StormResult<()>;
    /// Remove an idea and every vote cast on it
    async fn delete_idea(&self, id: &str) -> StormResult<()>;

    // Votes
    async fn votes_for_storm(&self, storm_id: &str) -> StormResult<Vec<Vote>>;
    async fn vote_for(&self, idea_id: &str, user_id: &str) -> StormResult<Option<Vote>>;
    /// Store a vote, dropping any earlier vote by the same user on the same
    /// idea. Returns the dropped vote.
    async fn replace_vote(&self, vote: Vote) -> StormResult<Option<Vote>>;

    // Participants
    async fn get_participant(&self, session_id: &str) -> StormResult<Option<Participant>>;
    async fn participants_for_storm(&self, storm_id: &str) -> StormResult<Vec<Participant>>;
    async fn insert_participant(&self, participant: Participant) -> StormResult<()>;

    // Whole-store snapshots
    async fn snapshot(&self) -> StormResult<StoreSnapshot>;
    /// Replace all stored data with the snapshot's contents
    async fn restore(&self, snapshot: StoreSnapshot) -> StormResult<()>;
}
