use crate::{
    id::SessionId,
    record::{self, pair, DecodeError, Fields},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod field {
    pub const PAYLOAD: &str = "payload";
    pub const ANSWERED_AT: &str = "answered_at";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub question_index: u32,
    pub session_id: SessionId,
    /// Encrypted answer body. Never inspected.
    pub payload: Box<str>,
    pub answered_at: DateTime<Utc>,
    /// One-based arrival position, taken from the order log.
    pub position: u32,
}

impl Answer {
    /// Fields written by the ledger. The position is derived from the order log instead.
    pub fn encode(payload: &str, answered_at: DateTime<Utc>) -> Vec<(Box<str>, Box<str>)> {
        Vec::from([pair(field::PAYLOAD, payload), pair(field::ANSWERED_AT, record::encode_timestamp(answered_at))])
    }

    pub fn from_fields(
        question_index: u32,
        session_id: SessionId,
        position: u32,
        fields: &Fields,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            question_index,
            session_id,
            position,
            payload: record::text(fields, field::PAYLOAD)?.into(),
            answered_at: record::timestamp(fields, field::ANSWERED_AT)?,
        })
    }
}
