use crate::{
    error::{Error, Result},
    require, validate, Orchestrator, ALLOCATION_ATTEMPTS,
};
use db::{keys, Command, Store};
use model::{Participant, QuizId, QuizState, SessionId, MAX_PARTICIPANTS};

impl<S: Store> Orchestrator<S> {
    /// Enrolls a participant. Anyone who knows the quiz ID may join while the quiz is in the lobby.
    pub async fn join(&self, quiz_id: &str, nickname: &str) -> Result<SessionId> {
        let id: QuizId = quiz_id.parse()?;
        let quiz = self.load(&id).await?;
        require(&quiz, QuizState::Lobby)?;
        let nickname = validate::nickname(nickname)?;

        let roster = keys::roster(&id);
        if self.store.set_len(&roster).await? >= MAX_PARTICIPANTS {
            return Err(Error::Capacity("participant"));
        }

        let mut session_id = None;
        for _ in 0..ALLOCATION_ATTEMPTS {
            let candidate = SessionId::generate();
            if !self.store.set_contains(&roster, candidate.as_str()).await? {
                session_id = Some(candidate);
                break;
            }
        }
        let session_id = session_id.ok_or(Error::Fatal)?;

        let participant = Participant { session_id, nickname, joined_at: self.now() };
        let commands = Vec::from([
            Command::HashSet { key: keys::participant(&id, &participant.session_id), fields: participant.to_fields() },
            Command::SetAdd { key: roster, member: participant.session_id.as_str().into() },
        ]);
        self.commit(&quiz, commands).await?;

        log::debug!("{} joined quiz {id} as {}", participant.nickname, participant.session_id);
        Ok(participant.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test(flavor = "current_thread")]
    async fn participants_are_listed_in_join_order() {
        let (quizzes, clock) = testing::orchestrator_with_clock();
        let game = testing::lobby(&quizzes, 0, 0).await;
        let ada = quizzes.join(game.id(), "  Ada ").await.unwrap();
        clock.advance(chrono::Duration::milliseconds(1));
        let bob = quizzes.join(game.id(), "Bob").await.unwrap();
        assert_ne!(ada, bob);

        let snapshot = quizzes.snapshot(game.id()).await.unwrap();
        let roster: Vec<_> = snapshot.participants.iter().map(|p| (&p.session_id, &*p.nickname)).collect();
        assert_eq!(roster, Vec::from([(&ada, "Ada"), (&bob, "Bob")]));
        assert_eq!(snapshot.quiz.participant_count, 2);
        assert_eq!(snapshot.quiz.version, 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn roster_is_capped() {
        let quizzes = testing::orchestrator();
        let game = testing::lobby(&quizzes, 0, MAX_PARTICIPANTS as usize).await;
        assert_eq!(quizzes.join(game.id(), "late").await, Err(Error::Capacity("participant")));
        assert_eq!(quizzes.snapshot(game.id()).await.unwrap().participants.len(), MAX_PARTICIPANTS as usize);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn blank_nicknames_are_rejected() {
        let quizzes = testing::orchestrator();
        let game = testing::lobby(&quizzes, 0, 0).await;
        assert_eq!(quizzes.join(game.id(), " \t ").await.unwrap_err().code(), "VALIDATION");
        assert_eq!(quizzes.snapshot(game.id()).await.unwrap().quiz.version, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn joining_requires_the_lobby() {
        let quizzes = testing::orchestrator();
        let game = testing::started(&quizzes, 1, 1).await;
        let err = quizzes.join(game.id(), "late").await.unwrap_err();
        assert_eq!(err.code(), "STATE_CONFLICT");
        assert_eq!(err.to_string(), "quiz must be in the lobby state but is currently active");
    }
}
