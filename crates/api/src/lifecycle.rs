use crate::{
    error::{Conflict, Result},
    require, stored_session, transition, Orchestrator,
};
use db::{keys, Command, Store};
use model::{Quiz, QuizState};
use std::collections::BTreeSet;

/// Moves the quiz along one edge of the state machine. Each operation owns exactly one edge.
fn step(quiz: &mut Quiz, from: QuizState, to: QuizState) -> Result<()> {
    require(quiz, from)?;
    transition(quiz, to)
}

fn progress(quiz: &Quiz) -> Command {
    Command::HashSet { key: keys::quiz(&quiz.id), fields: Vec::from(quiz.progress_fields()) }
}

impl<S: Store> Orchestrator<S> {
    /// Opens the first question.
    pub async fn start_quiz(&self, quiz_id: &str, admin_token: &str) -> Result<()> {
        let mut quiz = self.load_admin(quiz_id, admin_token).await?;
        require(&quiz, QuizState::Lobby)?;
        if quiz.question_count == 0 {
            return Err(Conflict::NoQuestions.into());
        }
        if self.store.set_len(&keys::roster(&quiz.id)).await? == 0 {
            return Err(Conflict::NoParticipants.into());
        }

        step(&mut quiz, QuizState::Lobby, QuizState::Active)?;
        quiz.current_question_index = 0;
        quiz.question_started_at = Some(self.now());
        self.commit(&quiz, Vec::from([progress(&quiz)])).await
    }

    /// Closes the current question and reveals its answers.
    pub async fn show_results(&self, quiz_id: &str, admin_token: &str) -> Result<()> {
        let mut quiz = self.load_admin(quiz_id, admin_token).await?;
        step(&mut quiz, QuizState::Active, QuizState::Results)?;
        quiz.question_started_at = None;
        self.commit(&quiz, Vec::from([progress(&quiz)])).await
    }

    pub async fn next_question(&self, quiz_id: &str, admin_token: &str) -> Result<()> {
        let mut quiz = self.load_admin(quiz_id, admin_token).await?;
        require(&quiz, QuizState::Results)?;
        let next = quiz.current_question_index + 1;
        if next >= quiz.question_count {
            return Err(Conflict::NoMoreQuestions.into());
        }

        step(&mut quiz, QuizState::Results, QuizState::Active)?;
        quiz.current_question_index = next;
        quiz.question_started_at = Some(self.now());
        self.commit(&quiz, Vec::from([progress(&quiz)])).await
    }

    pub async fn finish_quiz(&self, quiz_id: &str, admin_token: &str) -> Result<()> {
        let mut quiz = self.load_admin(quiz_id, admin_token).await?;
        step(&mut quiz, QuizState::Results, QuizState::Finished)?;
        quiz.question_started_at = None;
        self.commit(&quiz, Vec::from([progress(&quiz)])).await
    }

    /// Returns a finished quiz to the lobby for a replay. Participants and answers are discarded while the
    /// questions and the quiz metadata stay.
    pub async fn reset_quiz(&self, quiz_id: &str, admin_token: &str) -> Result<()> {
        let mut quiz = self.load_admin(quiz_id, admin_token).await?;
        step(&mut quiz, QuizState::Finished, QuizState::Lobby)?;
        quiz.current_question_index = 0;
        quiz.question_started_at = None;

        let doomed = self.session_keys(&quiz).await?;
        log::info!("resetting quiz {} ({} keys discarded)", quiz.id, doomed.len());
        self.commit(&quiz, Vec::from([Command::Delete(doomed), progress(&quiz)])).await
    }

    /// Removes every key of the quiz, whatever its state.
    pub async fn delete(&self, quiz_id: &str, admin_token: &str) -> Result<()> {
        let quiz = self.load_admin(quiz_id, admin_token).await?;
        let mut doomed = self.session_keys(&quiz).await?;
        doomed.push(keys::quiz(&quiz.id));
        doomed.push(keys::join_code(&quiz.join_code));
        doomed.extend((0..quiz.question_count).map(|index| keys::question(&quiz.id, index)));

        self.store.batch(Vec::from([Command::Delete(doomed)])).await?;
        log::info!("deleted quiz {}", quiz.id);
        self.publish(&quiz.id).await;
        Ok(())
    }

    /// Keys of everything participants have created: their records, the roster, every answer, and every order
    /// log. Sessions are gathered from both the roster and the order logs so that no answer is left behind.
    async fn session_keys(&self, quiz: &Quiz) -> Result<Vec<Box<str>>> {
        let roster = self.store.set_members(&keys::roster(&quiz.id)).await?;
        let mut members: BTreeSet<Box<str>> = roster.into_iter().collect();
        let logs: Vec<_> = (0..quiz.question_count).map(|index| keys::order_log(&quiz.id, index)).collect();
        for order_log in &logs {
            members.extend(self.store.list_range(order_log).await?);
        }

        let mut doomed = Vec::from([keys::roster(&quiz.id)]);
        for member in &members {
            let session = stored_session(member)?;
            doomed.push(keys::participant(&quiz.id, &session));
            doomed.extend((0..quiz.question_count).map(|index| keys::answer(&quiz.id, index, &session)));
        }
        doomed.extend(logs);
        Ok(doomed)
    }
}
