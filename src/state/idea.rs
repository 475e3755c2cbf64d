use super::AppState;
use crate::error::StormResult;
use crate::protocol::StormEvent;
use crate::types::*;

impl AppState {
    /// Submit an idea to a storm in ideation
    pub async fn submit_idea(
        &self,
        storm_id: &str,
        actor: &Participant,
        draft: IdeaDraft,
    ) -> StormResult<Idea> {
        Self::ensure_member(actor, storm_id)?;
        let _gate = self.lock_storm(storm_id).await;

        let mut session = self.load_session(storm_id).await?;
        let idea = session.submit_idea(actor, draft)?;
        self.store.insert_idea(idea.clone()).await?;

        tracing::info!(storm_id, idea_id = %idea.id, "Idea submitted");
        self.publish(StormEvent::IdeaSubmitted {
            storm_id: storm_id.to_string(),
            idea: (&idea).into(),
        });
        Ok(idea)
    }

    /// Edit an idea (author only, during ideation)
    pub async fn update_idea(
        &self,
        idea_id: &str,
        actor: &Participant,
        patch: IdeaPatch,
    ) -> StormResult<Idea> {
        let storm_id = self.storm_of_idea(idea_id).await?;
        let _gate = self.lock_storm(&storm_id).await;

        let mut session = self.load_session(&storm_id).await?;
        let idea = session.update_idea(idea_id, &actor.session_id, patch)?;
        self.store.update_idea(idea.clone()).await?;

        tracing::info!(storm_id = %storm_id, idea_id, "Idea updated");
        self.publish(StormEvent::IdeaUpdated {
            storm_id,
            idea: (&idea).into(),
        });
        Ok(idea)
    }

    /// Delete an idea (author or moderator, during ideation)
    pub async fn delete_idea(&self, idea_id: &str, actor: &Participant) -> StormResult<()> {
        let storm_id = self.storm_of_idea(idea_id).await?;
        let _gate = self.lock_storm(&storm_id).await;

        let mut session = self.load_session(&storm_id).await?;
        let removed = session.delete_idea(idea_id, actor)?;
        self.store.delete_idea(idea_id).await?;

        tracing::info!(
            storm_id = %storm_id,
            idea_id,
            dropped_votes = removed.votes.len(),
            "Idea deleted"
        );
        self.publish(StormEvent::IdeaDeleted {
            storm_id,
            idea_id: idea_id.to_string(),
        });
        Ok(())
    }
}
