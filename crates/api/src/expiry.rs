//! Every key that belongs to a quiz shares the quiz's expiration date. The date is fixed at creation; each batch
//! re-applies it to every key the batch writes, so no key can outlive its quiz.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use db::Command;
use model::{DEFAULT_EXPIRATION_HOURS, EXPIRATION_HOURS};

/// Computes the expiration date of a quiz created at `now`.
pub fn horizon(now: DateTime<Utc>, hours: Option<u32>) -> Result<DateTime<Utc>> {
    let hours = hours.unwrap_or(DEFAULT_EXPIRATION_HOURS);
    if !EXPIRATION_HOURS.contains(&hours) {
        return Err(Error::invalid("expiration must be between 1 and 168 hours"));
    }
    Ok(now + Duration::hours(hours.into()))
}

/// Appends an expiration to the batch covering every key that the batch creates or modifies.
pub fn seal(mut commands: Vec<Command>, at: DateTime<Utc>) -> Vec<Command> {
    let mut keys = Vec::new();
    for command in &commands {
        let key = match command {
            Command::HashSet { key, .. } | Command::HashIncr { key, .. } | Command::SetAdd { key, .. } => key,
            Command::Rename { to, .. } => to,
            Command::Require(_) | Command::Delete(_) | Command::ExpireAt { .. } => continue,
        };
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }

    if !keys.is_empty() {
        commands.push(Command::ExpireAt { keys, at });
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_defaults_to_a_day() {
        let now = Utc::now();
        assert_eq!(horizon(now, None).unwrap(), now + Duration::hours(24));
        assert_eq!(horizon(now, Some(1)).unwrap(), now + Duration::hours(1));
        assert_eq!(horizon(now, Some(168)).unwrap(), now + Duration::hours(168));
        assert_eq!(horizon(now, Some(0)).unwrap_err().code(), "VALIDATION");
        assert_eq!(horizon(now, Some(169)).unwrap_err().code(), "VALIDATION");
    }

    #[test]
    fn seal_covers_every_written_key_once() {
        let at = Utc::now();
        let sealed = seal(
            Vec::from([
                Command::Require("a".into()),
                Command::HashSet { key: "a".into(), fields: Vec::new() },
                Command::HashIncr { key: "a".into(), field: "version".into(), by: 1 },
                Command::SetAdd { key: "b".into(), member: "m".into() },
                Command::Rename { from: "c".into(), to: "d".into() },
                Command::Delete(Vec::from(["e".into()])),
            ]),
            at,
        );
        let Some(Command::ExpireAt { keys, at: sealed_at }) = sealed.last() else {
            panic!("batch was not sealed");
        };
        assert_eq!(keys, &Vec::<Box<str>>::from(["a".into(), "b".into(), "d".into()]));
        assert_eq!(*sealed_at, at);
    }

    #[test]
    fn deletions_alone_need_no_expiry() {
        let batch = Vec::from([Command::Delete(Vec::from(["a".into()]))]);
        assert_eq!(seal(batch.clone(), Utc::now()), batch);
    }
}
