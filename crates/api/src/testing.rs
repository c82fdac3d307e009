use crate::{Created, Orchestrator};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use db::{error, keys, AnswerWrite, Command, Fields, MemoryStore, Store, Subscription};
use model::{SessionId, MAX_QUESTIONS};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

pub const TIMER: u32 = 20;

pub fn orchestrator() -> Orchestrator<MemoryStore> {
    Orchestrator::new(Arc::new(MemoryStore::new()))
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    pub fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

pub fn orchestrator_with_clock() -> (Orchestrator<MemoryStore>, TestClock) {
    let clock = TestClock(Arc::new(Mutex::new(Utc::now())));
    let handle = clock.clone();
    (orchestrator().with_clock(move || handle.now()), clock)
}

pub struct Game {
    pub created: Created,
    pub sessions: Vec<SessionId>,
}

impl Game {
    pub fn id(&self) -> &str {
        self.created.id.as_str()
    }

    pub fn token(&self) -> &str {
        &self.created.admin_token
    }
}

/// A lobby with the given number of questions and participants.
pub async fn lobby<S: Store>(quizzes: &Orchestrator<S>, questions: u32, participants: usize) -> Game {
    let created = quizzes.create("metadata", TIMER, None).await.unwrap();
    let (id, token) = (created.id.as_str(), &*created.admin_token);
    for index in 0..questions {
        quizzes.add_question(id, token, &format!("question {index}"), None).await.unwrap();
    }
    let mut sessions = Vec::with_capacity(participants);
    for n in 0..participants {
        sessions.push(quizzes.join(id, &format!("player {n}")).await.unwrap());
    }
    Game { created, sessions }
}

/// Same as [`lobby`] but already playing the first question.
pub async fn started<S: Store>(quizzes: &Orchestrator<S>, questions: u32, participants: usize) -> Game {
    let game = lobby(quizzes, questions, participants).await;
    quizzes.start_quiz(game.id(), game.token()).await.unwrap();
    game
}

/// Every key of the game's quiz that is physically present in the store.
pub async fn all_keys<S: Store>(quizzes: &Orchestrator<S>, game: &Game) -> Vec<Box<str>> {
    let id = &game.created.id;
    let mut candidates = Vec::from([keys::quiz(id), keys::join_code(&game.created.join_code), keys::roster(id)]);
    for session in &game.sessions {
        candidates.push(keys::participant(id, session));
    }
    for index in 0..MAX_QUESTIONS {
        candidates.push(keys::question(id, index));
        candidates.push(keys::order_log(id, index));
        for session in &game.sessions {
            candidates.push(keys::answer(id, index, session));
        }
    }

    let mut present = Vec::new();
    for key in candidates {
        if quizzes.store().exists(&key).await.unwrap() {
            present.push(key);
        }
    }
    present
}

/// A [`MemoryStore`] that lets a test step in between an operation's reads and its write.
#[derive(Default)]
pub struct Interposed {
    inner: MemoryStore,
    /// Applied right before the next write, as if another caller got there first.
    interference: Mutex<Option<Vec<Command>>>,
    fail_next_batch: AtomicBool,
    claimed: Mutex<Vec<Box<str>>>,
}

impl Interposed {
    pub fn orchestrator() -> Orchestrator<Self> {
        Orchestrator::new(Arc::new(Self::default()))
    }

    pub fn interfere(&self, commands: Vec<Command>) {
        *self.interference.lock().unwrap() = Some(commands);
    }

    pub fn fail_next_batch(&self) {
        self.fail_next_batch.store(true, Ordering::SeqCst);
    }

    /// Keys handed out through [`Store::string_set_new`].
    pub fn claimed(&self) -> Vec<Box<str>> {
        self.claimed.lock().unwrap().clone()
    }

    async fn before_write(&self) {
        let pending = self.interference.lock().unwrap().take();
        if let Some(commands) = pending {
            self.inner.batch(commands).await.unwrap();
        }
    }
}

#[async_trait]
impl Store for Interposed {
    async fn ping(&self) -> error::Result<()> {
        self.inner.ping().await
    }

    async fn exists(&self, key: &str) -> error::Result<bool> {
        self.inner.exists(key).await
    }

    async fn expire_time(&self, key: &str) -> error::Result<Option<DateTime<Utc>>> {
        self.inner.expire_time(key).await
    }

    async fn string_get(&self, key: &str) -> error::Result<Option<Box<str>>> {
        self.inner.string_get(key).await
    }

    async fn string_set_new(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> error::Result<bool> {
        let written = self.inner.string_set_new(key, value, expires_at).await?;
        if written {
            self.claimed.lock().unwrap().push(key.into());
        }
        Ok(written)
    }

    async fn hash_get_all(&self, key: &str) -> error::Result<Option<Fields>> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_get_many(&self, keys: &[Box<str>]) -> error::Result<Vec<Option<Fields>>> {
        self.inner.hash_get_many(keys).await
    }

    async fn set_members(&self, key: &str) -> error::Result<Vec<Box<str>>> {
        self.inner.set_members(key).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> error::Result<bool> {
        self.inner.set_contains(key, member).await
    }

    async fn set_len(&self, key: &str) -> error::Result<u32> {
        self.inner.set_len(key).await
    }

    async fn list_range(&self, key: &str) -> error::Result<Vec<Box<str>>> {
        self.inner.list_range(key).await
    }

    async fn list_len(&self, key: &str) -> error::Result<u32> {
        self.inner.list_len(key).await
    }

    async fn batch(&self, commands: Vec<Command>) -> error::Result<()> {
        if self.fail_next_batch.swap(false, Ordering::SeqCst) {
            return Err(error::Error::Unavailable);
        }
        self.before_write().await;
        self.inner.batch(commands).await
    }

    async fn append_answer(&self, write: AnswerWrite) -> error::Result<u32> {
        self.before_write().await;
        self.inner.append_answer(write).await
    }

    async fn publish(&self, channel: &str, message: &str) -> error::Result<usize> {
        self.inner.publish(channel, message).await
    }

    async fn subscribe(&self, channel: &str) -> error::Result<Subscription> {
        self.inner.subscribe(channel).await
    }

    async fn subscriber_count(&self, channel: &str) -> error::Result<usize> {
        self.inner.subscriber_count(channel).await
    }

    async fn purge_expired(&self) -> error::Result<usize> {
        self.inner.purge_expired().await
    }
}
