use crate::{
    error::{Conflict, Error, Result},
    require, validate, Orchestrator,
};
use db::{error::Error as StoreError, keys, AnswerWrite, Store};
use model::{Answer, QuizId, QuizState, SessionId, MAX_ANSWER_PAYLOAD};

impl<S: Store> Orchestrator<S> {
    /// Records the participant's answer to the current question and returns its one-based arrival position.
    ///
    /// Every check short of the duplicate check happens up front. The duplicate check, both writes, and the
    /// position read are a single [`Store::append_answer`] call, so concurrent submissions for the same session
    /// can never both succeed. Answers do not bump the quiz version.
    pub async fn submit_answer(
        &self,
        quiz_id: &str,
        session_id: &str,
        question_index: u32,
        payload: &str,
    ) -> Result<u32> {
        let id: QuizId = quiz_id.parse()?;
        let session: SessionId = session_id.parse()?;
        let quiz = self.load(&id).await?;
        require(&quiz, QuizState::Active)?;
        if question_index != quiz.current_question_index {
            return Err(Conflict::NotCurrentQuestion {
                requested: question_index,
                current: quiz.current_question_index,
            }
            .into());
        }
        if !self.store.set_contains(&keys::roster(&id), session.as_str()).await? {
            return Err(Error::Forbidden("not a participant"));
        }
        validate::payload(payload, MAX_ANSWER_PAYLOAD)?;

        let write = AnswerWrite {
            guard_key: keys::quiz(&id),
            answer_key: keys::answer(&id, question_index, &session),
            order_key: keys::order_log(&id, question_index),
            member: session.as_str().into(),
            fields: Answer::encode(payload, self.now()),
            expires_at: quiz.expires_at,
        };
        let position = match self.store.append_answer(write).await {
            Ok(position) => position,
            Err(StoreError::AlreadyExists) => {
                log::debug!("{session} already answered question {question_index} of quiz {id}");
                return Err(Error::Duplicate);
            }
            Err(StoreError::Missing) => {
                log::debug!("quiz {id} was removed before {session} could answer");
                return Err(Error::NotFound("quiz"));
            }
            Err(err) => return Err(err.into()),
        };

        log::debug!("{session} answered question {question_index} of quiz {id} in position {position}");
        self.publish(&id).await;
        Ok(position)
    }
}
