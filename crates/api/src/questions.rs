use crate::{
    error::{Error, Result},
    require, validate, Orchestrator,
};
use db::{keys, Command, Store};
use model::{quiz::field, Question, Quiz, QuizState, MAX_QUESTIONS, MAX_QUESTION_PAYLOAD};

/// One entry of [`Orchestrator::upsert_questions`]. Entries with an index replace that question, the rest are
/// appended in order.
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub index: Option<u32>,
    pub payload: Box<str>,
    pub timer_override: Option<u32>,
}

fn check(payload: &str, timer_override: Option<u32>) -> Result<()> {
    validate::payload(payload, MAX_QUESTION_PAYLOAD)?;
    validate::timer_override(timer_override)
}

fn existing(quiz: &Quiz, index: u32) -> Result<()> {
    if index < quiz.question_count {
        Ok(())
    } else {
        Err(Error::NotFound("question"))
    }
}

fn write(quiz: &Quiz, question: &Question) -> Command {
    Command::HashSet { key: keys::question(&quiz.id, question.index), fields: question.to_fields() }
}

fn resize(quiz: &Quiz, by: i64) -> Command {
    Command::HashIncr { key: keys::quiz(&quiz.id), field: field::QUESTION_COUNT.into(), by }
}

impl<S: Store> Orchestrator<S> {
    /// Appends a question and returns its index.
    pub async fn add_question(
        &self,
        quiz_id: &str,
        admin_token: &str,
        payload: &str,
        timer_override: Option<u32>,
    ) -> Result<u32> {
        let quiz = self.load_admin(quiz_id, admin_token).await?;
        require(&quiz, QuizState::Lobby)?;
        check(payload, timer_override)?;
        if quiz.question_count >= MAX_QUESTIONS {
            return Err(Error::Capacity("question"));
        }

        let question = Question { index: quiz.question_count, payload: payload.into(), timer_override };
        self.commit(&quiz, Vec::from([write(&quiz, &question), resize(&quiz, 1)])).await?;
        log::debug!("quiz {} gained question {}", quiz.id, question.index);
        Ok(question.index)
    }

    pub async fn update_question(
        &self,
        quiz_id: &str,
        admin_token: &str,
        index: u32,
        payload: &str,
        timer_override: Option<u32>,
    ) -> Result<()> {
        let quiz = self.load_admin(quiz_id, admin_token).await?;
        require(&quiz, QuizState::Lobby)?;
        existing(&quiz, index)?;
        check(payload, timer_override)?;

        let question = Question { index, payload: payload.into(), timer_override };
        self.commit(&quiz, Vec::from([write(&quiz, &question)])).await
    }

    /// Removes a question and moves every later question down by one so that indices stay contiguous.
    pub async fn remove_question(&self, quiz_id: &str, admin_token: &str, index: u32) -> Result<()> {
        let quiz = self.load_admin(quiz_id, admin_token).await?;
        require(&quiz, QuizState::Lobby)?;
        existing(&quiz, index)?;

        let mut commands = Vec::from([Command::Delete(Vec::from([keys::question(&quiz.id, index)]))]);
        for later in index + 1..quiz.question_count {
            commands.push(Command::Rename {
                from: keys::question(&quiz.id, later),
                to: keys::question(&quiz.id, later - 1),
            });
        }
        commands.push(resize(&quiz, -1));
        self.commit(&quiz, commands).await?;
        log::debug!("quiz {} lost question {index}", quiz.id);
        Ok(())
    }

    /// Applies a mix of updates and appends as a single mutation. Returns the resulting question count.
    pub async fn upsert_questions(
        &self,
        quiz_id: &str,
        admin_token: &str,
        drafts: Vec<QuestionDraft>,
    ) -> Result<u32> {
        let quiz = self.load_admin(quiz_id, admin_token).await?;
        require(&quiz, QuizState::Lobby)?;
        if drafts.is_empty() {
            return Err(Error::invalid("at least one question is required"));
        }

        let mut next = quiz.question_count;
        let mut commands = Vec::with_capacity(drafts.len() + 1);
        for QuestionDraft { index, payload, timer_override } in drafts {
            check(&payload, timer_override)?;
            let index = match index {
                Some(index) => {
                    existing(&quiz, index)?;
                    index
                }
                None => {
                    if next >= MAX_QUESTIONS {
                        return Err(Error::Capacity("question"));
                    }
                    next += 1;
                    next - 1
                }
            };
            commands.push(write(&quiz, &Question { index, payload, timer_override }));
        }

        let appended = next - quiz.question_count;
        if appended > 0 {
            commands.push(resize(&quiz, appended.into()));
        }
        self.commit(&quiz, commands).await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, TIMER};

    fn draft(index: Option<u32>, payload: &str) -> QuestionDraft {
        QuestionDraft { index, payload: payload.into(), timer_override: None }
    }

    fn expected(items: &[(u32, &str)]) -> Vec<(u32, Box<str>)> {
        items.iter().map(|&(index, payload)| (index, payload.into())).collect()
    }

    async fn payloads(quizzes: &Orchestrator<db::MemoryStore>, id: &str) -> Vec<(u32, Box<str>)> {
        let snapshot = quizzes.snapshot(id).await.unwrap();
        snapshot.questions.unwrap_or_default().into_iter().map(|q| (q.index, q.payload)).collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn questions_are_appended_up_to_the_cap() {
        let quizzes = testing::orchestrator();
        let game = testing::lobby(&quizzes, 0, 0).await;
        for index in 0..MAX_QUESTIONS {
            assert_eq!(quizzes.add_question(game.id(), game.token(), "q", None).await, Ok(index));
        }
        let err = quizzes.add_question(game.id(), game.token(), "q", None).await.unwrap_err();
        assert_eq!(err, Error::Capacity("question"));

        let snapshot = quizzes.snapshot(game.id()).await.unwrap();
        assert_eq!(snapshot.quiz.question_count, MAX_QUESTIONS);
        assert_eq!(snapshot.quiz.version, 1 + u64::from(MAX_QUESTIONS));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn question_input_is_validated() {
        let quizzes = testing::orchestrator();
        let game = testing::lobby(&quizzes, 1, 0).await;
        let oversized = "x".repeat(MAX_QUESTION_PAYLOAD + 1);
        let err = quizzes.add_question(game.id(), game.token(), &oversized, None).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        let err = quizzes.add_question(game.id(), game.token(), "q", Some(301)).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        let err = quizzes.update_question(game.id(), game.token(), 0, "", None).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        assert_eq!(quizzes.snapshot(game.id()).await.unwrap().quiz.version, 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn updates_replace_payload_and_timer() {
        let quizzes = testing::orchestrator();
        let game = testing::lobby(&quizzes, 2, 0).await;
        quizzes.update_question(game.id(), game.token(), 1, "changed", Some(45)).await.unwrap();

        let questions = quizzes.snapshot(game.id()).await.unwrap().questions.unwrap();
        assert_eq!(questions[1], Question { index: 1, payload: "changed".into(), timer_override: Some(45) });
        assert_eq!(questions[1].effective_timer(TIMER), 45);
        assert_eq!(questions[0].effective_timer(TIMER), TIMER);

        let err = quizzes.update_question(game.id(), game.token(), 2, "q", None).await.unwrap_err();
        assert_eq!(err, Error::NotFound("question"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn removal_keeps_indices_contiguous() {
        let quizzes = testing::orchestrator();
        let game = testing::lobby(&quizzes, 4, 0).await;
        quizzes.remove_question(game.id(), game.token(), 1).await.unwrap();

        assert_eq!(
            payloads(&quizzes, game.id()).await,
            expected(&[(0, "question 0"), (1, "question 2"), (2, "question 3")]),
        );
        let snapshot = quizzes.snapshot(game.id()).await.unwrap();
        assert_eq!(snapshot.quiz.question_count, 3);
        assert!(!quizzes.store().exists(&keys::question(&game.created.id, 3)).await.unwrap());

        quizzes.remove_question(game.id(), game.token(), 2).await.unwrap();
        quizzes.remove_question(game.id(), game.token(), 0).await.unwrap();
        assert_eq!(payloads(&quizzes, game.id()).await, expected(&[(0, "question 2")]));

        let err = quizzes.remove_question(game.id(), game.token(), 1).await.unwrap_err();
        assert_eq!(err, Error::NotFound("question"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn upsert_is_one_mutation() {
        let quizzes = testing::orchestrator();
        let game = testing::lobby(&quizzes, 2, 0).await;
        let drafts = Vec::from([draft(Some(0), "first"), draft(None, "third"), draft(None, "fourth")]);
        assert_eq!(quizzes.upsert_questions(game.id(), game.token(), drafts).await, Ok(4));

        assert_eq!(
            payloads(&quizzes, game.id()).await,
            expected(&[(0, "first"), (1, "question 1"), (2, "third"), (3, "fourth")]),
        );
        let snapshot = quizzes.snapshot(game.id()).await.unwrap();
        assert_eq!(snapshot.quiz.version, 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejected_upserts_change_nothing() {
        let quizzes = testing::orchestrator();
        let game = testing::lobby(&quizzes, 49, 0).await;
        let before = quizzes.snapshot(game.id()).await.unwrap();

        let err = quizzes.upsert_questions(game.id(), game.token(), Vec::new()).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        let unknown = Vec::from([draft(None, "new"), draft(Some(60), "missing")]);
        let err = quizzes.upsert_questions(game.id(), game.token(), unknown).await.unwrap_err();
        assert_eq!(err, Error::NotFound("question"));
        let overflow = Vec::from([draft(None, "fits"), draft(None, "does not")]);
        let err = quizzes.upsert_questions(game.id(), game.token(), overflow).await.unwrap_err();
        assert_eq!(err, Error::Capacity("question"));

        assert_eq!(quizzes.snapshot(game.id()).await.unwrap(), before);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn questions_are_frozen_outside_the_lobby() {
        let quizzes = testing::orchestrator();
        let game = testing::started(&quizzes, 2, 1).await;

        let err = quizzes.add_question(game.id(), game.token(), "late", None).await.unwrap_err();
        assert_eq!(err.code(), "STATE_CONFLICT");
        assert!(err.to_string().contains("lobby"));
        let err = quizzes.remove_question(game.id(), game.token(), 0).await.unwrap_err();
        assert_eq!(err.code(), "STATE_CONFLICT");
        let err = quizzes.upsert_questions(game.id(), game.token(), Vec::from([draft(None, "q")])).await;
        assert_eq!(err.unwrap_err().code(), "STATE_CONFLICT");
    }
}
