pub mod error;
pub mod expiry;
pub mod token;

mod ledger;
mod lifecycle;
mod notifier;
mod questions;
mod roster;
mod validate;

#[cfg(test)]
mod testing;

pub use db;
pub use error::{Conflict, Error, Result};
pub use model;
pub use notifier::LiveFeed;
pub use questions::QuestionDraft;

use chrono::{DateTime, Utc};
use db::{keys, Command, Store};
use model::{quiz, JoinCode, Quiz, QuizId, QuizState, SessionId, MAX_QUIZ_PAYLOAD};
use std::sync::Arc;

/// Body of every change signal. Subscribers never look inside.
const UPDATED: &str = "updated";

/// How many random identifiers we draw before concluding that something is wrong with the store.
const ALLOCATION_ATTEMPTS: usize = 8;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of creating a quiz. The admin token is never retrievable again.
#[derive(Debug, Clone)]
pub struct Created {
    pub id: QuizId,
    pub admin_token: Box<str>,
    pub join_code: JoinCode,
}

/// The quiz state machine. This is the only entry point callers use.
///
/// An orchestrator holds nothing but a handle to the shared store, so it is cheap to clone and any number of
/// them (in any number of processes) may serve the same quizzes.
pub struct Orchestrator<S> {
    store: Arc<S>,
    clock: Clock,
}

impl<S> Clone for Orchestrator<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), clock: Arc::clone(&self.clock) }
    }
}

impl<S: Store> Orchestrator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, clock: Arc::new(Utc::now) }
    }

    /// Replaces the wall clock, e.g. to observe expiration without waiting for it.
    pub fn with_clock<F>(self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self { clock: Arc::new(clock), ..self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current time at the millisecond precision the store keeps.
    fn now(&self) -> DateTime<Utc> {
        let now = (self.clock)();
        DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
    }

    /// Creates a quiz in the lobby.
    pub async fn create(
        &self,
        payload: &str,
        timer_seconds_default: u32,
        expiration_hours: Option<u32>,
    ) -> Result<Created> {
        validate::payload(payload, MAX_QUIZ_PAYLOAD)?;
        validate::timer(timer_seconds_default)?;
        let now = self.now();
        let expires_at = expiry::horizon(now, expiration_hours)?;

        // Draw an unused quiz ID
        let mut id = None;
        for _ in 0..ALLOCATION_ATTEMPTS {
            let candidate = QuizId::generate();
            if !self.store.exists(&keys::quiz(&candidate)).await? {
                id = Some(candidate);
                break;
            }
        }
        let id = id.ok_or(Error::Fatal)?;

        // Claim a join code
        let mut join_code = None;
        for _ in 0..ALLOCATION_ATTEMPTS {
            let candidate = JoinCode::generate();
            if self.store.string_set_new(&keys::join_code(&candidate), id.as_str(), expires_at).await? {
                join_code = Some(candidate);
                break;
            }
        }
        let Some(join_code) = join_code else {
            log::error!("no free join code after {ALLOCATION_ATTEMPTS} attempts");
            return Err(Error::Fatal);
        };

        let token::Issued { token, digest } = token::issue();
        let quiz = Quiz {
            id: id.clone(),
            join_code: join_code.clone(),
            state: QuizState::Lobby,
            current_question_index: 0,
            question_started_at: None,
            timer_seconds_default,
            question_count: 0,
            version: 1,
            payload: payload.into(),
            created_at: now,
            expires_at,
            admin_token_hash: digest,
        };
        let commands = Vec::from([Command::HashSet { key: keys::quiz(&id), fields: quiz.to_fields() }]);
        if let Err(err) = self.store.batch(expiry::seal(commands, expires_at)).await {
            let claimed = Vec::from([keys::join_code(&join_code)]);
            if let Err(cleanup) = self.store.batch(Vec::from([Command::Delete(claimed)])).await {
                log::error!("join code {join_code} stays claimed by unwritten quiz {id}: {cleanup}");
            }
            return Err(err.into());
        }

        log::info!("created quiz {id} with join code {join_code}");
        Ok(Created { id, admin_token: token, join_code })
    }

    /// Confirms that the token belongs to the quiz without touching anything.
    pub async fn verify_admin(&self, quiz_id: &str, admin_token: &str) -> Result<()> {
        self.load_admin(quiz_id, admin_token).await.map(drop)
    }

    /// Finds the quiz behind a join code.
    pub async fn resolve_join_code(&self, code: &str) -> Result<QuizId> {
        let code = JoinCode::normalize(code)?;
        let raw = self.store.string_get(&keys::join_code(&code)).await?.ok_or(Error::NotFound("quiz"))?;
        let Ok(id) = raw.parse::<QuizId>() else {
            log::error!("join code {code} points at malformed quiz id");
            return Err(Error::Fatal);
        };
        self.load(&id).await?;
        Ok(id)
    }

    /// Physically reclaims keys of expired quizzes.
    pub async fn purge_expired(&self) -> Result<usize> {
        let purged = self.store.purge_expired().await?;
        if purged > 0 {
            log::info!("reclaimed {purged} expired keys");
        }
        Ok(purged)
    }

    /// Store connectivity check. Failures are logged and reported as plain unavailability.
    pub async fn health(&self) -> Result<()> {
        self.store.ping().await.map_err(|err| {
            log::error!("store health check failed: {err}");
            Error::Unavailable
        })
    }

    /// Loads a quiz, treating expired quizzes as gone no matter what the store still holds.
    async fn load(&self, id: &QuizId) -> Result<Quiz> {
        let fields = self.store.hash_get_all(&keys::quiz(id)).await?.ok_or(Error::NotFound("quiz"))?;
        let quiz = Quiz::from_fields(&fields)?;
        if quiz.is_expired(self.now()) {
            return Err(Error::Expired);
        }
        Ok(quiz)
    }

    async fn load_admin(&self, quiz_id: &str, admin_token: &str) -> Result<Quiz> {
        let id: QuizId = quiz_id.parse()?;
        let quiz = self.load(&id).await?;
        if !token::verify(admin_token, &quiz.admin_token_hash) {
            log::warn!("rejected admin token for quiz {id}");
            return Err(Error::Forbidden("invalid admin token"));
        }
        Ok(quiz)
    }

    /// Writes a mutation of the quiz as one batch, bumps the version by exactly one, refreshes the expiry of
    /// everything written, and finally signals subscribers.
    ///
    /// The batch only applies while the quiz record still exists. A quiz deleted after it was loaded stays
    /// deleted, and the mutation fails with [`Error::NotFound`].
    async fn commit(&self, quiz: &Quiz, commands: Vec<Command>) -> Result<()> {
        let record = keys::quiz(&quiz.id);
        let mut batch = Vec::with_capacity(commands.len() + 2);
        batch.push(Command::Require(record.clone()));
        batch.extend(commands);
        batch.push(Command::HashIncr { key: record, field: quiz::field::VERSION.into(), by: 1 });
        if let Err(err) = self.store.batch(expiry::seal(batch, quiz.expires_at)).await {
            if err == db::error::Error::Missing {
                log::debug!("quiz {} was removed before the write", quiz.id);
            }
            return Err(err.into());
        }
        self.publish(&quiz.id).await;
        Ok(())
    }

    /// The mutation has already committed by the time we get here, so a failed signal is not an error.
    async fn publish(&self, id: &QuizId) {
        match self.store.publish(&keys::channel(id), UPDATED).await {
            Ok(receivers) => log::debug!("signalled {receivers} subscribers of quiz {id}"),
            Err(err) => log::warn!("failed to signal subscribers of quiz {id}: {err}"),
        }
    }
}

fn require(quiz: &Quiz, required: QuizState) -> Result<()> {
    if quiz.state == required {
        Ok(())
    } else {
        Err(Conflict::Requires { required, current: quiz.state }.into())
    }
}

fn transition(quiz: &mut Quiz, to: QuizState) -> Result<()> {
    if !quiz.state.can_transition(to) {
        return Err(Conflict::Transition { from: quiz.state, to }.into());
    }
    log::info!("quiz {} moves from {} to {}", quiz.id, quiz.state, to);
    quiz.state = to;
    Ok(())
}

/// Parses a session ID read back from a roster or an order log.
fn stored_session(member: &str) -> Result<SessionId> {
    member.parse().map_err(|_| {
        log::error!("store holds malformed session id {member:?}");
        Error::Fatal
    })
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
