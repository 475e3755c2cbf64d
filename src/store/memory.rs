use super::{StoreSnapshot, StormStore};
use crate::error::{StormError, StormResult};
use crate::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store, optionally mirrored to a JSON snapshot file.
///
/// Locks are always taken in the order storms, ideas, votes, participants.
/// Writes are staged on a copy, persisted, and only then made visible, so a
/// failed snapshot write leaves the store unchanged.
#[derive(Clone, Default)]
pub struct MemoryStore {
    storms: Arc<RwLock<HashMap<StormId, Storm>>>,
    ideas: Arc<RwLock<HashMap<IdeaId, Idea>>>,
    votes: Arc<RwLock<HashMap<VoteId, Vote>>>,
    participants: Arc<RwLock<HashMap<SessionId, Participant>>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// A store that lives only in memory
    pub fn new() -> Self {
        Self::default()
    }

    /// A store backed by a snapshot file. Loads the file if it exists.
    pub async fn open(path: impl AsRef<Path>) -> StormResult<Self> {
        let path = path.as_ref().to_path_buf();
        let store = Self {
            snapshot_path: Some(path.clone()),
            ..Self::default()
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
                snapshot.validate().map_err(StormError::Storage)?;
                store
                    .commit(|staged| {
                        *staged = snapshot;
                        Ok(())
                    })
                    .await?;
                tracing::info!(path = %path.display(), "Loaded storm snapshot");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No snapshot yet, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(store)
    }

    async fn capture(&self) -> StoreSnapshot {
        let storms = self.storms.read().await;
        let ideas = self.ideas.read().await;
        let votes = self.votes.read().await;
        let participants = self.participants.read().await;
        StoreSnapshot::new(
            storms.clone(),
            ideas.clone(),
            votes.clone(),
            participants.clone(),
        )
    }

    /// Apply `change` to a staged copy of the whole store, write the snapshot
    /// file (if configured), then swap the copy in. All write locks are held
    /// throughout, so readers see either the old or the new state.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut StoreSnapshot) -> StormResult<T>,
    ) -> StormResult<T> {
        let mut storms = self.storms.write().await;
        let mut ideas = self.ideas.write().await;
        let mut votes = self.votes.write().await;
        let mut participants = self.participants.write().await;

        let mut staged = StoreSnapshot::new(
            storms.clone(),
            ideas.clone(),
            votes.clone(),
            participants.clone(),
        );
        let outcome = change(&mut staged)?;

        if let Some(path) = &self.snapshot_path {
            Self::write_snapshot(path, &staged).await?;
        }

        *storms = staged.storms;
        *ideas = staged.ideas;
        *votes = staged.votes;
        *participants = staged.participants;
        Ok(outcome)
    }

    /// Write to a temp file first and rename it over the old one
    async fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> StormResult<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = path.with_extension("tmp");
        if let Err(e) = tokio::fs::write(&tmp, json).await {
            tracing::error!(path = %path.display(), "Snapshot write failed: {}", e);
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!(path = %path.display(), "Snapshot written");
        Ok(())
    }
}

#[async_trait]
impl StormStore for MemoryStore {
    async fn get_storm(&self, id: &str) -> StormResult<Option<Storm>> {
        Ok(self.storms.read().await.get(id).cloned())
    }

    async fn list_storms(&self, status: Option<StormStatus>) -> StormResult<Vec<Storm>> {
        let mut storms: Vec<Storm> = self
            .storms
            .read()
            .await
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        storms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(storms)
    }

    async fn insert_storm(&self, storm: Storm, moderator: Participant) -> StormResult<()> {
        self.commit(|s| {
            s.participants.insert(moderator.session_id.clone(), moderator);
            s.storms.insert(storm.id.clone(), storm);
            Ok(())
        })
        .await
    }

    async fn update_storm(&self, storm: Storm) -> StormResult<()> {
        self.commit(|s| {
            if !s.storms.contains_key(&storm.id) {
                return Err(StormError::not_found("Storm", storm.id));
            }
            s.storms.insert(storm.id.clone(), storm);
            Ok(())
        })
        .await
    }

    async fn delete_storm(&self, id: &str) -> StormResult<()> {
        self.commit(|s| {
            if s.storms.remove(id).is_none() {
                return Err(StormError::not_found("Storm", id));
            }
            s.ideas.retain(|_, i| i.storm_id != id);
            s.votes.retain(|_, v| v.storm_id != id);
            s.participants.retain(|_, p| p.storm_id != id);
            Ok(())
        })
        .await
    }

    async fn get_idea(&self, id: &str) -> StormResult<Option<Idea>> {
        Ok(self.ideas.read().await.get(id).cloned())
    }

    async fn ideas_for_storm(&self, storm_id: &str) -> StormResult<Vec<Idea>> {
        Ok(self
            .ideas
            .read()
            .await
            .values()
            .filter(|i| i.storm_id == storm_id)
            .cloned()
            .collect())
    }

    async fn insert_idea(&self, idea: Idea) -> StormResult<()> {
        self.commit(|s| {
            if !s.storms.contains_key(&idea.storm_id) {
                return Err(StormError::not_found("Storm", idea.storm_id));
            }
            s.ideas.insert(idea.id.clone(), idea);
            Ok(())
        })
        .await
    }

    async fn update_idea(&self, idea: Idea) -> StormResult<()> {
        self.commit(|s| {
            if !s.ideas.contains_key(&idea.id) {
                return Err(StormError::not_found("Idea", idea.id));
            }
            s.ideas.insert(idea.id.clone(), idea);
            Ok(())
        })
        .await
    }

    async fn delete_idea(&self, id: &str) -> StormResult<()> {
        self.commit(|s| {
            if s.ideas.remove(id).is_none() {
                return Err(StormError::not_found("Idea", id));
            }
            s.votes.retain(|_, v| v.idea_id != id);
            Ok(())
        })
        .await
    }

    async fn votes_for_storm(&self, storm_id: &str) -> StormResult<Vec<Vote>> {
        Ok(self
            .votes
            .read()
            .await
            .values()
            .filter(|v| v.storm_id == storm_id)
            .cloned()
            .collect())
    }

    async fn vote_for(&self, idea_id: &str, user_id: &str) -> StormResult<Option<Vote>> {
        Ok(self
            .votes
            .read()
            .await
            .values()
            .find(|v| v.idea_id == idea_id && v.user_id == user_id)
            .cloned())
    }

    async fn replace_vote(&self, vote: Vote) -> StormResult<Option<Vote>> {
        self.commit(|s| {
            if !s.ideas.contains_key(&vote.idea_id) {
                return Err(StormError::not_found("Idea", vote.idea_id));
            }
            let previous_id = s
                .votes
                .values()
                .find(|v| v.idea_id == vote.idea_id && v.user_id == vote.user_id)
                .map(|v| v.id.clone());
            let replaced = previous_id.and_then(|id| s.votes.remove(&id));
            s.votes.insert(vote.id.clone(), vote);
            Ok(replaced)
        })
        .await
    }

    async fn get_participant(&self, session_id: &str) -> StormResult<Option<Participant>> {
        Ok(self.participants.read().await.get(session_id).cloned())
    }

    async fn participants_for_storm(&self, storm_id: &str) -> StormResult<Vec<Participant>> {
        let mut participants: Vec<Participant> = self
            .participants
            .read()
            .await
            .values()
            .filter(|p| p.storm_id == storm_id)
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(participants)
    }

    async fn insert_participant(&self, participant: Participant) -> StormResult<()> {
        self.commit(|s| {
            if !s.storms.contains_key(&participant.storm_id) {
                return Err(StormError::not_found("Storm", participant.storm_id));
            }
            s.participants.insert(participant.session_id.clone(), participant);
            Ok(())
        })
        .await
    }

    async fn snapshot(&self) -> StormResult<StoreSnapshot> {
        Ok(self.capture().await)
    }

    async fn restore(&self, snapshot: StoreSnapshot) -> StormResult<()> {
        snapshot.validate().map_err(StormError::Storage)?;
        self.commit(|staged| {
            *staged = snapshot;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SNAPSHOT_SCHEMA_VERSION;

    fn ts() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    fn storm(id: &str, moderator_id: &str) -> Storm {
        Storm {
            id: id.to_string(),
            title: format!("Storm {}", id),
            description: String::new(),
            status: StormStatus::Ideation,
            token_budget: TokenBudget::default(),
            moderator_id: moderator_id.to_string(),
            ideation_time_limit: None,
            voting_time_limit: None,
            expires_at: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn participant(session_id: &str, storm_id: &str, role: Role) -> Participant {
        Participant {
            session_id: session_id.to_string(),
            username: session_id.to_string(),
            storm_id: storm_id.to_string(),
            role,
            created_at: ts(),
        }
    }

    fn idea(id: &str, storm_id: &str) -> Idea {
        Idea {
            id: id.to_string(),
            storm_id: storm_id.to_string(),
            author_id: "alice".to_string(),
            author_username: "alice".to_string(),
            title: id.to_string(),
            description: String::new(),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn vote(id: &str, idea_id: &str, storm_id: &str, user_id: &str, blue: u32) -> Vote {
        Vote {
            id: id.to_string(),
            idea_id: idea_id.to_string(),
            storm_id: storm_id.to_string(),
            user_id: user_id.to_string(),
            blue_tokens: blue,
            red_tokens: 0,
            comment: "ok".to_string(),
            created_at: ts(),
        }
    }

    /// Store with storm S1 (moderator "mod1", idea "i1") and storm S2
    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_storm(storm("S1", "mod1"), participant("mod1", "S1", Role::Moderator))
            .await
            .unwrap();
        store
            .insert_storm(storm("S2", "mod2"), participant("mod2", "S2", Role::Moderator))
            .await
            .unwrap();
        store.insert_idea(idea("i1", "S1")).await.unwrap();
        store.insert_idea(idea("i2", "S2")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_storm_creates_moderator() {
        let store = seeded().await;
        let moderator = store.get_participant("mod1").await.unwrap().unwrap();
        assert_eq!(moderator.role, Role::Moderator);
        assert_eq!(store.get_storm("S1").await.unwrap().unwrap().moderator_id, "mod1");
    }

    #[tokio::test]
    async fn test_list_storms_filters_by_status() {
        let store = seeded().await;
        let mut s2 = store.get_storm("S2").await.unwrap().unwrap();
        s2.status = StormStatus::Voting;
        store.update_storm(s2).await.unwrap();

        assert_eq!(store.list_storms(None).await.unwrap().len(), 2);
        let voting = store.list_storms(Some(StormStatus::Voting)).await.unwrap();
        assert_eq!(voting.len(), 1);
        assert_eq!(voting[0].id, "S2");
    }

    #[tokio::test]
    async fn test_replace_vote_keeps_one_per_user_and_idea() {
        let store = seeded().await;
        let first = store.replace_vote(vote("v1", "i1", "S1", "bob", 2)).await.unwrap();
        assert!(first.is_none());

        let replaced = store.replace_vote(vote("v2", "i1", "S1", "bob", 3)).await.unwrap();
        assert_eq!(replaced.map(|v| v.id), Some("v1".to_string()));

        let votes = store.votes_for_storm("S1").await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].blue_tokens, 3);
        assert_eq!(
            store.vote_for("i1", "bob").await.unwrap().map(|v| v.id),
            Some("v2".to_string())
        );
    }

    #[tokio::test]
    async fn test_replace_vote_unknown_idea() {
        let store = seeded().await;
        let result = store.replace_vote(vote("v1", "nope", "S1", "bob", 1)).await;
        assert!(matches!(result, Err(StormError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_idea_cascades_votes() {
        let store = seeded().await;
        store.replace_vote(vote("v1", "i1", "S1", "bob", 1)).await.unwrap();

        store.delete_idea("i1").await.unwrap();
        assert!(store.get_idea("i1").await.unwrap().is_none());
        assert!(store.votes_for_storm("S1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_storm_cascades() {
        let store = seeded().await;
        store.replace_vote(vote("v1", "i1", "S1", "bob", 1)).await.unwrap();
        store
            .insert_participant(participant("bob", "S1", Role::Participant))
            .await
            .unwrap();

        store.delete_storm("S1").await.unwrap();

        assert!(store.get_storm("S1").await.unwrap().is_none());
        assert!(store.ideas_for_storm("S1").await.unwrap().is_empty());
        assert!(store.votes_for_storm("S1").await.unwrap().is_empty());
        assert!(store.participants_for_storm("S1").await.unwrap().is_empty());

        // The other storm is untouched
        assert_eq!(store.ideas_for_storm("S2").await.unwrap().len(), 1);
        assert!(store.get_participant("mod2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_storm_not_found() {
        let store = MemoryStore::new();
        let result = store.delete_storm("nope").await;
        assert!(matches!(result, Err(StormError::NotFound { kind: "Storm", .. })));
    }

    #[tokio::test]
    async fn test_insert_participant_requires_storm() {
        let store = MemoryStore::new();
        let result = store
            .insert_participant(participant("bob", "missing", Role::Participant))
            .await;
        assert!(matches!(result, Err(StormError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_snapshot_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storms.json");

        {
            let store = MemoryStore::open(&path).await.unwrap();
            store
                .insert_storm(storm("S1", "mod1"), participant("mod1", "S1", Role::Moderator))
                .await
                .unwrap();
            store.insert_idea(idea("i1", "S1")).await.unwrap();
            store.replace_vote(vote("v1", "i1", "S1", "mod1", 2)).await.unwrap();
        }

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert!(reopened.get_storm("S1").await.unwrap().is_some());
        assert_eq!(reopened.ideas_for_storm("S1").await.unwrap().len(), 1);
        assert_eq!(reopened.votes_for_storm("S1").await.unwrap()[0].blue_tokens, 2);
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storms.json");
        let snapshot = StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION + 1,
            ..StoreSnapshot::default()
        };
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        let result = MemoryStore::open(&path).await;
        assert!(matches!(result, Err(StormError::Storage(_))));
    }

    #[tokio::test]
    async fn test_restore_replaces_contents() {
        let store = seeded().await;
        let snapshot = store.snapshot().await.unwrap();

        let fresh = MemoryStore::new();
        fresh.restore(snapshot).await.unwrap();
        assert_eq!(fresh.list_storms(None).await.unwrap().len(), 2);
        assert!(fresh.get_idea("i2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("storms.json");
        let store = MemoryStore::open(&path).await.unwrap();

        let result = store
            .insert_storm(storm("S1", "mod1"), participant("mod1", "S1", Role::Moderator))
            .await;
        assert!(matches!(result, Err(StormError::Storage(_))));
        assert!(store.get_storm("S1").await.unwrap().is_none());
        assert!(store.get_participant("mod1").await.unwrap().is_none());
        assert!(store.list_storms(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storms.json");
        let store = MemoryStore::open(&path).await.unwrap();
        store
            .insert_storm(storm("S1", "mod1"), participant("mod1", "S1", Role::Moderator))
            .await
            .unwrap();
        store.insert_idea(idea("i1", "S1")).await.unwrap();

        // A directory where the temp file should go makes the write fail
        std::fs::create_dir(path.with_extension("tmp")).unwrap();

        let result = store.delete_storm("S1").await;
        assert!(matches!(result, Err(StormError::Storage(_))));
        assert!(store.get_storm("S1").await.unwrap().is_some());
        assert_eq!(store.ideas_for_storm("S1").await.unwrap().len(), 1);

        // The file on disk still holds the last successful write
        let reopened = MemoryStore::open(&path).await.unwrap();
        assert!(reopened.get_idea("i1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restore_rejects_invalid_snapshot() {
        let store = seeded().await;
        let bad = StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION + 1,
            ..StoreSnapshot::default()
        };
        assert!(matches!(store.restore(bad).await, Err(StormError::Storage(_))));
        assert_eq!(store.list_storms(None).await.unwrap().len(), 2);
    }
}
