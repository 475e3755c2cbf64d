use super::AppState;
use crate::error::{StormError, StormResult};
use crate::protocol::StormEvent;
use crate::session::{now, IdeaTally, StormDescription};
use crate::types::*;

impl AppState {
    /// Create a storm and its moderator participant
    pub async fn create_storm(
        &self,
        draft: StormDraft,
    ) -> StormResult<(StormDescription, Participant)> {
        let id = self.unused_storm_code().await?;
        let moderator_id = Self::new_session_id();
        let ts = now();

        let storm = Storm {
            id: id.clone(),
            title: draft.title,
            description: draft.description,
            status: StormStatus::Ideation,
            token_budget: draft.token_budget.unwrap_or(self.config.default_budget),
            moderator_id: moderator_id.clone(),
            ideation_time_limit: draft.ideation_time_limit,
            voting_time_limit: draft.voting_time_limit,
            expires_at: None,
            created_at: ts.clone(),
            updated_at: ts.clone(),
        };
        let moderator = Participant {
            session_id: moderator_id,
            username: MODERATOR_USERNAME.to_string(),
            storm_id: id.clone(),
            role: Role::Moderator,
            created_at: ts,
        };

        self.store.insert_storm(storm, moderator.clone()).await?;
        tracing::info!(storm_id = %id, "Storm created");

        let description = self.describe_storm(&id).await?;
        Ok((description, moderator))
    }

    /// Full read-only view of a storm
    pub async fn describe_storm(&self, storm_id: &str) -> StormResult<StormDescription> {
        let session = self.load_session(storm_id).await?;
        let participants = self.store.participants_for_storm(storm_id).await?;
        Ok(session.describe(&participants))
    }

    /// All storms, newest first, optionally filtered by status
    pub async fn list_storms(
        &self,
        status: Option<StormStatus>,
    ) -> StormResult<Vec<StormDescription>> {
        let storms = self.store.list_storms(status).await?;
        let mut descriptions = Vec::with_capacity(storms.len());
        for storm in storms {
            match self.describe_storm(&storm.id).await {
                Ok(description) => descriptions.push(description),
                // Deleted between listing and loading
                Err(StormError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(descriptions)
    }

    /// Move a storm to its next phase (moderator only)
    pub async fn advance_phase(
        &self,
        storm_id: &str,
        actor: &Participant,
    ) -> StormResult<StormDescription> {
        Self::ensure_member(actor, storm_id)?;
        let _gate = self.lock_storm(storm_id).await;

        let mut session = self.load_session(storm_id).await?;
        let status = session.advance_phase(actor)?;
        self.store.update_storm(session.storm().clone()).await?;

        tracing::info!(storm_id, %status, "Storm advanced");
        self.publish(StormEvent::PhaseAdvanced {
            storm_id: storm_id.to_string(),
            status,
        });

        let participants = self.store.participants_for_storm(storm_id).await?;
        Ok(session.describe(&participants))
    }

    /// Delete a storm with everything in it (moderator only)
    pub async fn delete_storm(&self, storm_id: &str, actor: &Participant) -> StormResult<()> {
        Self::ensure_member(actor, storm_id)?;
        {
            let _gate = self.lock_storm(storm_id).await;
            let storm = self
                .store
                .get_storm(storm_id)
                .await?
                .ok_or_else(|| StormError::not_found("Storm", storm_id))?;
            if !actor.is_moderator_of(&storm) {
                return Err(StormError::Forbidden(
                    "only the moderator can delete this storm".to_string(),
                ));
            }
            self.store.delete_storm(storm_id).await?;
        }
        self.forget_gate(storm_id).await;

        tracing::info!(storm_id, "Storm deleted");
        self.publish(StormEvent::StormDeleted {
            storm_id: storm_id.to_string(),
        });
        Ok(())
    }

    /// Ranked idea scores. Only available once the storm reached results.
    pub async fn results(&self, storm_id: &str) -> StormResult<Vec<IdeaTally>> {
        let session = self.load_session(storm_id).await?;
        let status = session.storm().status;
        if status != StormStatus::Results {
            return Err(StormError::InvalidPhase {
                expected: StormStatus::Results,
                actual: status,
            });
        }
        let participants = self.store.participants_for_storm(storm_id).await?;
        Ok(session.tally(&participants))
    }
}
