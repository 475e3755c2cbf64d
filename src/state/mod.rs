mod idea;
mod participant;
mod storm;
mod vote;

use crate::config::Config;
use crate::error::{StormError, StormResult};
use crate::protocol::StormEvent;
use crate::session::StormSession;
use crate::store::{MemoryStore, StormStore};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StormStore>,
    pub config: Arc<Config>,
    /// One mutex per storm, held from loading a snapshot until its changes are stored
    write_gates: Arc<Mutex<HashMap<StormId, Arc<Mutex<()>>>>>,
    /// Live updates for WebSocket subscribers
    pub events: broadcast::Sender<StormEvent>,
}

impl AppState {
    pub fn new(store: Arc<dyn StormStore>, config: Config) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            store,
            config: Arc::new(config),
            write_gates: Arc::new(Mutex::new(HashMap::new())),
            events: tx,
        }
    }

    /// In-memory state with default config (tests and local runs)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Config::default())
    }

    /// Serialize writers of one storm
    async fn lock_storm(&self, storm_id: &str) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.write_gates.lock().await;
            gates
                .entry(storm_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        gate.lock_owned().await
    }

    async fn forget_gate(&self, storm_id: &str) {
        self.write_gates.lock().await.remove(storm_id);
    }

    /// Load a storm with its ideas and votes
    async fn load_session(&self, storm_id: &str) -> StormResult<StormSession> {
        let storm = self
            .store
            .get_storm(storm_id)
            .await?
            .ok_or_else(|| StormError::not_found("Storm", storm_id))?;
        let ideas = self.store.ideas_for_storm(storm_id).await?;
        let votes = self.store.votes_for_storm(storm_id).await?;
        Ok(StormSession::new(storm, ideas, votes))
    }

    /// Storm id that owns an idea
    async fn storm_of_idea(&self, idea_id: &str) -> StormResult<StormId> {
        self.store
            .get_idea(idea_id)
            .await?
            .map(|idea| idea.storm_id)
            .ok_or_else(|| StormError::not_found("Idea", idea_id))
    }

    /// Look up the participant behind a session id
    pub async fn participant(&self, session_id: &str) -> StormResult<Option<Participant>> {
        self.store.get_participant(session_id).await
    }

    /// Participants only act within the storm they joined
    fn ensure_member(actor: &Participant, storm_id: &str) -> StormResult<()> {
        if actor.storm_id != storm_id {
            return Err(StormError::Forbidden(
                "session belongs to a different storm".to_string(),
            ));
        }
        Ok(())
    }

    /// Send an event to all WebSocket subscribers
    pub fn publish(&self, event: StormEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
