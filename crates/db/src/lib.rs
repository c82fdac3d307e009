pub mod error;
pub mod keys;
pub mod pubsub;

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use model::Fields;
pub use pubsub::{Signal, Subscription};

/// A write issued as part of a [`Store::batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Aborts the batch with [`Missing`](error::Error::Missing) unless the key is present. Writes nothing.
    Require(Box<str>),
    /// Sets the given fields of a hash, creating it if needed. Existing expiry is kept.
    HashSet { key: Box<str>, fields: Vec<(Box<str>, Box<str>)> },
    /// Adds to the integer stored in a hash field. Missing fields count as zero.
    HashIncr { key: Box<str>, field: Box<str>, by: i64 },
    /// Adds a member to a set, creating it if needed.
    SetAdd { key: Box<str>, member: Box<str> },
    /// Moves a key (together with its expiry), overwriting the destination.
    Rename { from: Box<str>, to: Box<str> },
    /// Removes keys. Absent keys are ignored.
    Delete(Vec<Box<str>>),
    /// Schedules keys for removal at an absolute instant. Absent keys are ignored.
    ExpireAt { keys: Vec<Box<str>>, at: DateTime<Utc> },
}

/// Input of the atomic answer append. See [`Store::append_answer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerWrite {
    /// The answer is only recorded while this key is present.
    pub guard_key: Box<str>,
    pub answer_key: Box<str>,
    pub order_key: Box<str>,
    pub member: Box<str>,
    pub fields: Vec<(Box<str>, Box<str>)>,
    pub expires_at: DateTime<Utc>,
}

/// The shared key-value and pub/sub store that holds every piece of quiz state. Callers never keep state of
/// their own, so any number of processes may share one store.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Cheap connectivity check.
    async fn ping(&self) -> error::Result<()>;

    async fn exists(&self, key: &str) -> error::Result<bool>;

    /// When the key is scheduled to disappear. `None` for absent keys and keys without an expiry.
    async fn expire_time(&self, key: &str) -> error::Result<Option<DateTime<Utc>>>;

    async fn string_get(&self, key: &str) -> error::Result<Option<Box<str>>>;

    /// Sets a string only if the key is absent. Returns whether the value was written.
    async fn string_set_new(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> error::Result<bool>;

    async fn hash_get_all(&self, key: &str) -> error::Result<Option<Fields>>;

    /// Pipelined [`Store::hash_get_all`]. Results are in the order of `keys`.
    async fn hash_get_many(&self, keys: &[Box<str>]) -> error::Result<Vec<Option<Fields>>>;

    async fn set_members(&self, key: &str) -> error::Result<Vec<Box<str>>>;

    async fn set_contains(&self, key: &str, member: &str) -> error::Result<bool>;

    async fn set_len(&self, key: &str) -> error::Result<u32>;

    async fn list_range(&self, key: &str) -> error::Result<Vec<Box<str>>>;

    async fn list_len(&self, key: &str) -> error::Result<u32>;

    /// Applies every command or none of them. No other operation observes a partially applied batch.
    async fn batch(&self, commands: Vec<Command>) -> error::Result<()>;

    /// The one check-and-write primitive of the store. As a single indivisible step: fail with
    /// [`Missing`](error::Error::Missing) if `guard_key` is absent, or with
    /// [`AlreadyExists`](error::Error::AlreadyExists) if `answer_key` is present; otherwise write the hash,
    /// append `member` to the list at `order_key`, expire both at `expires_at`, and return the new list length.
    async fn append_answer(&self, write: AnswerWrite) -> error::Result<u32>;

    /// Returns the number of subscriptions that received the message.
    async fn publish(&self, channel: &str, message: &str) -> error::Result<usize>;

    async fn subscribe(&self, channel: &str) -> error::Result<Subscription>;

    async fn subscriber_count(&self, channel: &str) -> error::Result<usize>;

    /// Physically removes every key whose expiry has passed. Returns how many were removed.
    async fn purge_expired(&self) -> error::Result<usize>;
}
