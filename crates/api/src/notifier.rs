//! Live projection of a quiz. Subscribers never receive diffs: every change signal triggers a complete
//! recomputation from the store, so a snapshot always reflects at least the state that caused the signal.

use crate::{
    count,
    error::{Error, Result},
    stored_session, Orchestrator,
};
use core::future::Future;
use db::{keys, Fields, Store, Subscription};
use futures_util::stream::{self, Stream};
use model::{Answer, CurrentQuestion, Participant, Question, Quiz, QuizId, QuizState, QuizSummary, Snapshot};

impl<S: Store> Orchestrator<S> {
    /// One-shot projection, identical to the first item of a [`LiveFeed`].
    pub async fn snapshot(&self, quiz_id: &str) -> Result<Snapshot> {
        let id: QuizId = quiz_id.parse()?;
        self.project(&id).await
    }

    /// Subscribes to a quiz. The subscription is taken before the first snapshot is computed, so no change
    /// can slip in between the two.
    pub async fn subscribe(&self, quiz_id: &str) -> Result<LiveFeed<S>> {
        let id: QuizId = quiz_id.parse()?;
        self.load(&id).await?;
        let subscription = self.store.subscribe(&keys::channel(&id)).await?;
        log::debug!("opened live feed for quiz {id}");
        Ok(LiveFeed { quizzes: self.clone(), quiz: id, subscription, primed: false, done: false })
    }

    async fn project(&self, id: &QuizId) -> Result<Snapshot> {
        let quiz = self.load(id).await?;
        let participants = self.participants(&quiz).await?;

        let questions = match quiz.state {
            QuizState::Lobby if quiz.question_count > 0 => Some(self.questions(&quiz).await?),
            _ => None,
        };
        let current = match quiz.state {
            QuizState::Active | QuizState::Results => Some(self.current_question(&quiz).await?),
            QuizState::Lobby | QuizState::Finished => None,
        };
        let answers = match quiz.state {
            QuizState::Results | QuizState::Finished => Some(self.answers(&quiz).await?),
            QuizState::Lobby | QuizState::Active => None,
        };

        let summary = QuizSummary::new(&quiz, count(participants.len()));
        Ok(Snapshot { quiz: summary, participants, questions, current, answers })
    }

    async fn participants(&self, quiz: &Quiz) -> Result<Vec<Participant>> {
        let sessions = self
            .store
            .set_members(&keys::roster(&quiz.id))
            .await?
            .iter()
            .map(|member| stored_session(member))
            .collect::<Result<Vec<_>>>()?;
        let records: Vec<_> = sessions.iter().map(|session| keys::participant(&quiz.id, session)).collect();
        let records = self.store.hash_get_many(&records).await?;

        let mut participants = Vec::with_capacity(sessions.len());
        for (session, fields) in sessions.into_iter().zip(records) {
            if let Some(fields) = fields {
                participants.push(Participant::from_fields(session, &fields)?);
            }
        }
        participants.sort_by(|a, b| (a.joined_at, &a.session_id).cmp(&(b.joined_at, &b.session_id)));
        Ok(participants)
    }

    async fn questions(&self, quiz: &Quiz) -> Result<Vec<Question>> {
        let records: Vec<_> = (0..quiz.question_count).map(|index| keys::question(&quiz.id, index)).collect();
        let records = self.store.hash_get_many(&records).await?;
        let mut questions = Vec::with_capacity(records.len());
        for (index, fields) in (0..).zip(records) {
            let fields = counted_question(quiz, index, fields)?;
            questions.push(Question::from_fields(index, &fields)?);
        }
        Ok(questions)
    }

    async fn current_question(&self, quiz: &Quiz) -> Result<CurrentQuestion> {
        let index = quiz.current_question_index;
        let fields = self.store.hash_get_all(&keys::question(&quiz.id, index)).await?;
        let fields = counted_question(quiz, index, fields)?;
        let question = Question::from_fields(index, &fields)?;
        let answer_count = self.store.list_len(&keys::order_log(&quiz.id, index)).await?;
        Ok(CurrentQuestion {
            index,
            timer_seconds: question.effective_timer(quiz.timer_seconds_default),
            payload: question.payload,
            started_at: quiz.question_started_at,
            answer_count,
        })
    }

    /// Answers to the current question, ordered by the order log.
    async fn answers(&self, quiz: &Quiz) -> Result<Vec<Answer>> {
        let index = quiz.current_question_index;
        let sessions = self
            .store
            .list_range(&keys::order_log(&quiz.id, index))
            .await?
            .iter()
            .map(|member| stored_session(member))
            .collect::<Result<Vec<_>>>()?;
        let records: Vec<_> = sessions.iter().map(|session| keys::answer(&quiz.id, index, session)).collect();
        let records = self.store.hash_get_many(&records).await?;

        let mut answers = Vec::with_capacity(sessions.len());
        for ((position, session), fields) in (1..).zip(sessions).zip(records) {
            if let Some(fields) = fields {
                answers.push(Answer::from_fields(index, session, position, &fields)?);
            }
        }
        Ok(answers)
    }
}

/// Sequence of snapshots of one quiz: one right away, then one after every change.
///
/// Dropping the feed unsubscribes from the quiz, however the consumer stops.
pub struct LiveFeed<S> {
    quizzes: Orchestrator<S>,
    quiz: QuizId,
    subscription: Subscription,
    primed: bool,
    done: bool,
}

impl<S: Store> LiveFeed<S> {
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz
    }

    /// Waits for the next snapshot. There is no timeout: between changes this blocks for as long as the quiz
    /// stays quiet.
    ///
    /// Signals that pile up while a snapshot is being computed collapse into a single recomputation. Once the
    /// quiz is gone the error is reported once and the feed ends with `None`.
    pub async fn next(&mut self) -> Option<Result<Snapshot>> {
        if self.done {
            return None;
        }
        if self.primed {
            self.subscription.recv().await?;
            let coalesced = self.subscription.drain();
            if coalesced > 0 {
                log::trace!("coalesced {coalesced} extra signals for quiz {}", self.quiz);
            }
        }
        self.primed = true;

        let snapshot = self.quizzes.project(&self.quiz).await;
        if let Err(err) = &snapshot {
            log::debug!("closing live feed for quiz {}: {err}", self.quiz);
            self.done = true;
        }
        Some(snapshot)
    }

    /// Adapts the feed into a stream that ends as soon as `cancel` resolves. The subscription is released
    /// together with the stream.
    pub fn into_stream<C>(self, cancel: C) -> impl Stream<Item = Result<Snapshot>> + Send
    where
        C: Future<Output = ()> + Send + 'static,
    {
        stream::unfold((self, Box::pin(cancel)), |(mut feed, mut cancel)| async move {
            let item = tokio::select! {
                biased;
                () = &mut cancel => None,
                item = feed.next() => item,
            };
            item.map(|item| (item, (feed, cancel)))
        })
    }
}

/// Every index below `question_count` holds a question. A gap means the records disagree.
fn counted_question(quiz: &Quiz, index: u32, fields: Option<Fields>) -> Result<Fields> {
    fields.ok_or_else(|| {
        log::error!("quiz {} counts {} questions but question {index} is missing", quiz.id, quiz.question_count);
        Error::Fatal
    })
}
