use super::AppState;
use crate::error::{StormError, StormResult};
use crate::protocol::StormEvent;
use crate::session::{now, StormDescription};
use crate::types::*;
use rand::Rng;

const CODE_PREFIX: &str = "STORM-";
const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;

/// Generate a random storm code such as `STORM-7QX2KD`
fn generate_storm_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect();
    format!("{}{}", CODE_PREFIX, suffix)
}

impl AppState {
    /// A storm code that no existing storm uses
    pub(super) async fn unused_storm_code(&self) -> StormResult<StormId> {
        loop {
            let code = generate_storm_code();
            if self.store.get_storm(&code).await?.is_none() {
                return Ok(code);
            }
            // Collision - try again (36^6 codes)
        }
    }

    pub(super) fn new_session_id() -> SessionId {
        format!("session-{}", ulid::Ulid::new())
    }

    /// Join a storm as an anonymous participant
    pub async fn join_storm(
        &self,
        storm_id: &str,
        username: String,
    ) -> StormResult<(StormDescription, Participant)> {
        if self.store.get_storm(storm_id).await?.is_none() {
            return Err(StormError::not_found("Storm", storm_id));
        }

        let participant = Participant {
            session_id: Self::new_session_id(),
            username,
            storm_id: storm_id.to_string(),
            role: Role::Participant,
            created_at: now(),
        };
        self.store.insert_participant(participant.clone()).await?;

        tracing::info!(
            storm_id,
            username = %participant.username,
            "Participant joined"
        );
        self.publish(StormEvent::ParticipantJoined {
            storm_id: storm_id.to_string(),
            participant: (&participant).into(),
        });

        let description = self.describe_storm(storm_id).await?;
        Ok((description, participant))
    }

    /// Tokens the participant has spent in their storm and what is left
    pub async fn token_spend(&self, actor: &Participant) -> StormResult<TokenSpend> {
        let session = self.load_session(&actor.storm_id).await?;
        Ok(session.token_spend(&actor.session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storm_code_format() {
        for _ in 0..50 {
            let code = generate_storm_code();
            assert_eq!(code.len(), CODE_PREFIX.len() + CODE_LENGTH);
            let suffix = code.strip_prefix(CODE_PREFIX).unwrap();
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = AppState::new_session_id();
        let b = AppState::new_session_id();
        assert!(a.starts_with("session-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_join_storm() {
        let state = AppState::in_memory();
        let (description, _) = state
            .create_storm(StormDraft {
                title: "Join me".to_string(),
                ..StormDraft::default()
            })
            .await
            .unwrap();

        let (joined, participant) = state
            .join_storm(&description.storm.id, "alice".to_string())
            .await
            .unwrap();

        assert_eq!(participant.role, Role::Participant);
        assert_eq!(participant.username, "alice");
        assert_eq!(joined.participants.len(), 2);
        assert_eq!(
            state.participant(&participant.session_id).await.unwrap(),
            Some(participant)
        );
    }

    #[tokio::test]
    async fn test_join_unknown_storm() {
        let state = AppState::in_memory();
        let result = state.join_storm("STORM-NOPE00", "alice".to_string()).await;
        assert!(matches!(result, Err(StormError::NotFound { kind: "Storm", .. })));
    }

    #[tokio::test]
    async fn test_join_publishes_event() {
        let state = AppState::in_memory();
        let (description, _) = state.create_storm(StormDraft::default()).await.unwrap();
        let mut rx = state.events.subscribe();

        state
            .join_storm(&description.storm.id, "bob".to_string())
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            StormEvent::ParticipantJoined {
                storm_id,
                participant,
            } => {
                assert_eq!(storm_id, description.storm.id);
                assert_eq!(participant.username, "bob");
            }
            other => panic!("Expected ParticipantJoined, got {:?}", other),
        }
    }
}
