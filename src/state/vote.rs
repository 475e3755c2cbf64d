use super::AppState;
use crate::error::{StormError, StormResult};
use crate::protocol::StormEvent;
use crate::types::*;

impl AppState {
    /// Spend tokens on an idea, replacing the caller's earlier vote on it.
    ///
    /// The storm's write gate is held from the budget check until the vote is
    /// stored, so two concurrent votes by one user can't both pass the check.
    pub async fn cast_vote(
        &self,
        idea_id: &str,
        actor: &Participant,
        ballot: Ballot,
    ) -> StormResult<Vote> {
        let storm_id = self.storm_of_idea(idea_id).await?;
        Self::ensure_member(actor, &storm_id)?;
        let _gate = self.lock_storm(&storm_id).await;

        let mut session = self.load_session(&storm_id).await?;
        let cast = session.cast_vote(idea_id, &actor.session_id, ballot)?;
        self.store.replace_vote(cast.vote.clone()).await?;

        tracing::info!(
            storm_id = %storm_id,
            idea_id,
            blue = cast.vote.blue_tokens,
            red = cast.vote.red_tokens,
            replaced = cast.replaced.is_some(),
            "Vote cast"
        );
        self.publish(StormEvent::VoteCast {
            storm_id,
            vote: (&cast.vote).into(),
        });
        Ok(cast.vote)
    }

    /// The caller's current vote on an idea
    pub async fn vote_of(&self, idea_id: &str, actor: &Participant) -> StormResult<Vote> {
        self.store
            .vote_for(idea_id, &actor.session_id)
            .await?
            .ok_or_else(|| StormError::not_found("Vote", idea_id))
    }
}
