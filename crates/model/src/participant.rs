use crate::{
    id::SessionId,
    record::{self, pair, DecodeError, Fields},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod field {
    pub const NICKNAME: &str = "nickname";
    pub const JOINED_AT: &str = "joined_at";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub session_id: SessionId,
    pub nickname: Box<str>,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn to_fields(&self) -> Vec<(Box<str>, Box<str>)> {
        Vec::from([
            pair(field::NICKNAME, self.nickname.clone()),
            pair(field::JOINED_AT, record::encode_timestamp(self.joined_at)),
        ])
    }

    pub fn from_fields(session_id: SessionId, fields: &Fields) -> Result<Self, DecodeError> {
        Ok(Self {
            session_id,
            nickname: record::text(fields, field::NICKNAME)?.into(),
            joined_at: record::timestamp(fields, field::JOINED_AT)?,
        })
    }
}
