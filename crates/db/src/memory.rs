use super::{
    error::{Error, Result},
    pubsub::{Broker, Subscription},
    AnswerWrite, Command, Fields, Store,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
enum Value {
    Str(Box<str>),
    Hash(Fields),
    Set(BTreeSet<Box<str>>),
    List(Vec<Box<str>>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

type Keyspace = HashMap<Box<str>, Entry>;

fn evict_expired(keys: &mut Keyspace, key: &str, now: DateTime<Utc>) {
    if keys.get(key).is_some_and(|entry| !entry.is_live(now)) {
        keys.remove(key);
    }
}

fn len_of(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// In-process implementation of the shared store. Every operation takes the keyspace lock exactly once, which
/// makes each batch and each [`Store::append_answer`] call indivisible with respect to all other callers.
///
/// Expired keys are invisible to every read as soon as their deadline passes, and are physically reclaimed
/// either when a write touches them or by [`Store::purge_expired`].
#[derive(Default)]
pub struct MemoryStore {
    keys: RwLock<Keyspace>,
    broker: Broker,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Keyspace>> {
        self.keys.read().map_err(|_| Error::Unavailable)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Keyspace>> {
        self.keys.write().map_err(|_| Error::Unavailable)
    }

    fn with_live<T>(&self, key: &str, f: impl FnOnce(Option<&Value>) -> Result<T>) -> Result<T> {
        let keys = self.read()?;
        let now = Utc::now();
        f(keys.get(key).filter(|entry| entry.is_live(now)).map(|entry| &entry.value))
    }
}

/// Applies a batch while remembering the original state of every key it touches, so that a failing command can
/// put everything back.
struct Transaction<'k> {
    keys: &'k mut Keyspace,
    now: DateTime<Utc>,
    undo: HashMap<Box<str>, Option<Entry>>,
}

impl<'k> Transaction<'k> {
    fn new(keys: &'k mut Keyspace) -> Self {
        Self { keys, now: Utc::now(), undo: HashMap::new() }
    }

    fn touch(&mut self, key: &str) {
        if !self.undo.contains_key(key) {
            let previous = self.keys.get(key).cloned();
            self.undo.insert(key.into(), previous);
        }
        evict_expired(self.keys, key, self.now);
    }

    fn entry_or_insert(&mut self, key: &str, empty: fn() -> Value) -> &mut Entry {
        self.touch(key);
        self.keys.entry(key.into()).or_insert_with(|| Entry { value: empty(), expires_at: None })
    }

    fn hash(&mut self, key: &str) -> Result<&mut Fields> {
        match &mut self.entry_or_insert(key, || Value::Hash(Fields::new())).value {
            Value::Hash(hash) => Ok(hash),
            _ => Err(Error::WrongType),
        }
    }

    fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Require(key) => {
                if !self.keys.get(&key).is_some_and(|entry| entry.is_live(self.now)) {
                    return Err(Error::Missing);
                }
            }
            Command::HashSet { key, fields } => self.hash(&key)?.extend(fields),
            Command::HashIncr { key, field, by } => {
                let hash = self.hash(&key)?;
                let current: i64 = match hash.get(&field) {
                    Some(raw) => raw.parse().map_err(|_| Error::WrongType)?,
                    None => 0,
                };
                let next = current.checked_add(by).ok_or(Error::WrongType)?;
                hash.insert(field, next.to_string().into_boxed_str());
            }
            Command::SetAdd { key, member } => {
                let Value::Set(set) = &mut self.entry_or_insert(&key, || Value::Set(BTreeSet::new())).value else {
                    return Err(Error::WrongType);
                };
                set.insert(member);
            }
            Command::Rename { from, to } => {
                self.touch(&from);
                let entry = self.keys.remove(&from).ok_or(Error::NoSuchKey)?;
                self.touch(&to);
                self.keys.insert(to, entry);
            }
            Command::Delete(keys) => {
                for key in keys {
                    self.touch(&key);
                    self.keys.remove(&key);
                }
            }
            Command::ExpireAt { keys, at } => {
                for key in keys {
                    self.touch(&key);
                    if let Some(entry) = self.keys.get_mut(&key) {
                        entry.expires_at = Some(at);
                    }
                }
            }
        }
        Ok(())
    }

    fn rollback(self) {
        for (key, previous) in self.undo {
            match previous {
                Some(entry) => self.keys.insert(key, entry),
                None => self.keys.remove(&key),
            };
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.read().map(drop)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.with_live(key, |value| Ok(value.is_some()))
    }

    async fn expire_time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let keys = self.read()?;
        let now = Utc::now();
        Ok(keys.get(key).filter(|entry| entry.is_live(now)).and_then(|entry| entry.expires_at))
    }

    async fn string_get(&self, key: &str) -> Result<Option<Box<str>>> {
        self.with_live(key, |value| match value {
            Some(Value::Str(text)) => Ok(Some(text.clone())),
            Some(_) => Err(Error::WrongType),
            None => Ok(None),
        })
    }

    async fn string_set_new(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let mut keys = self.write()?;
        evict_expired(&mut keys, key, Utc::now());
        if keys.contains_key(key) {
            return Ok(false);
        }
        keys.insert(key.into(), Entry { value: Value::Str(value.into()), expires_at: Some(expires_at) });
        Ok(true)
    }

    async fn hash_get_all(&self, key: &str) -> Result<Option<Fields>> {
        self.with_live(key, |value| match value {
            Some(Value::Hash(hash)) => Ok(Some(hash.clone())),
            Some(_) => Err(Error::WrongType),
            None => Ok(None),
        })
    }

    async fn hash_get_many(&self, keys: &[Box<str>]) -> Result<Vec<Option<Fields>>> {
        let space = self.read()?;
        let now = Utc::now();
        keys.iter()
            .map(|key| match space.get(key).filter(|entry| entry.is_live(now)).map(|entry| &entry.value) {
                Some(Value::Hash(hash)) => Ok(Some(hash.clone())),
                Some(_) => Err(Error::WrongType),
                None => Ok(None),
            })
            .collect()
    }

    async fn set_members(&self, key: &str) -> Result<Vec<Box<str>>> {
        self.with_live(key, |value| match value {
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(Error::WrongType),
            None => Ok(Vec::new()),
        })
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        self.with_live(key, |value| match value {
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(Error::WrongType),
            None => Ok(false),
        })
    }

    async fn set_len(&self, key: &str) -> Result<u32> {
        self.with_live(key, |value| match value {
            Some(Value::Set(set)) => Ok(len_of(set.len())),
            Some(_) => Err(Error::WrongType),
            None => Ok(0),
        })
    }

    async fn list_range(&self, key: &str) -> Result<Vec<Box<str>>> {
        self.with_live(key, |value| match value {
            Some(Value::List(list)) => Ok(list.clone()),
            Some(_) => Err(Error::WrongType),
            None => Ok(Vec::new()),
        })
    }

    async fn list_len(&self, key: &str) -> Result<u32> {
        self.with_live(key, |value| match value {
            Some(Value::List(list)) => Ok(len_of(list.len())),
            Some(_) => Err(Error::WrongType),
            None => Ok(0),
        })
    }

    async fn batch(&self, commands: Vec<Command>) -> Result<()> {
        let mut keys = self.write()?;
        let mut tx = Transaction::new(&mut keys);
        for command in commands {
            if let Err(err) = tx.apply(command) {
                tx.rollback();
                return Err(err);
            }
        }
        Ok(())
    }

    async fn append_answer(&self, write: AnswerWrite) -> Result<u32> {
        let AnswerWrite { guard_key, answer_key, order_key, member, fields, expires_at } = write;
        let mut keys = self.write()?;
        let now = Utc::now();
        evict_expired(&mut keys, &answer_key, now);
        evict_expired(&mut keys, &order_key, now);

        // Every check happens before the first write.
        if !keys.get(&guard_key).is_some_and(|entry| entry.is_live(now)) {
            return Err(Error::Missing);
        }
        if keys.contains_key(&answer_key) {
            return Err(Error::AlreadyExists);
        }
        if keys.get(&order_key).is_some_and(|entry| !matches!(entry.value, Value::List(_))) {
            return Err(Error::WrongType);
        }

        let answer = Value::Hash(fields.into_iter().collect());
        keys.insert(answer_key, Entry { value: answer, expires_at: Some(expires_at) });
        let log = keys.entry(order_key).or_insert_with(|| Entry { value: Value::List(Vec::new()), expires_at: None });
        log.expires_at = Some(expires_at);
        let Value::List(list) = &mut log.value else {
            return Err(Error::WrongType);
        };
        list.push(member);
        Ok(len_of(list.len()))
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        Ok(self.broker.publish(channel, message))
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        Ok(self.broker.subscribe(channel))
    }

    async fn subscriber_count(&self, channel: &str) -> Result<usize> {
        Ok(self.broker.subscriber_count(channel))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut keys = self.write()?;
        let now = Utc::now();
        let before = keys.len();
        keys.retain(|_, entry| entry.is_live(now));
        let purged = before - keys.len();
        if purged > 0 {
            log::debug!("purged {purged} expired keys");
        }
        Ok(purged)
    }
}
