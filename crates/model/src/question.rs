use crate::record::{self, pair, DecodeError, Fields};
use serde::Serialize;

pub mod field {
    pub const PAYLOAD: &str = "payload";
    pub const TIMER: &str = "timer";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    /// Position within the quiz. Always contiguous from zero.
    pub index: u32,
    /// Encrypted question body. Never inspected.
    pub payload: Box<str>,
    /// Seconds to answer, overriding the quiz default.
    pub timer_override: Option<u32>,
}

impl Question {
    pub fn effective_timer(&self, default: u32) -> u32 {
        self.timer_override.unwrap_or(default)
    }

    pub fn to_fields(&self) -> Vec<(Box<str>, Box<str>)> {
        Vec::from([
            pair(field::PAYLOAD, self.payload.clone()),
            pair(field::TIMER, record::encode_optional_number(self.timer_override)),
        ])
    }

    /// The index lives in the key rather than the record.
    pub fn from_fields(index: u32, fields: &Fields) -> Result<Self, DecodeError> {
        Ok(Self {
            index,
            payload: record::text(fields, field::PAYLOAD)?.into(),
            timer_override: record::optional_number(fields, field::TIMER)?,
        })
    }
}
