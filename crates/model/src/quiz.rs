use crate::{
    id::{JoinCode, QuizId},
    record::{self, pair, DecodeError, Fields},
    state::QuizState,
};
use chrono::{DateTime, Utc};

/// Field names of the quiz hash.
pub mod field {
    pub const ID: &str = "id";
    pub const JOIN_CODE: &str = "join_code";
    pub const STATE: &str = "state";
    pub const CURRENT_QUESTION_INDEX: &str = "current_question_index";
    pub const QUESTION_STARTED_AT: &str = "question_started_at";
    pub const TIMER_SECONDS_DEFAULT: &str = "timer_seconds_default";
    pub const QUESTION_COUNT: &str = "question_count";
    pub const VERSION: &str = "version";
    pub const PAYLOAD: &str = "payload";
    pub const CREATED_AT: &str = "created_at";
    pub const EXPIRES_AT: &str = "expires_at";
    pub const ADMIN_TOKEN_HASH: &str = "admin_token_hash";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub id: QuizId,
    pub join_code: JoinCode,
    pub state: QuizState,
    pub current_question_index: u32,
    /// Only set while a question is open for answers.
    pub question_started_at: Option<DateTime<Utc>>,
    pub timer_seconds_default: u32,
    pub question_count: u32,
    pub version: u64,
    /// Encrypted quiz metadata. Never inspected.
    pub payload: Box<str>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Hex-encoded digest of the admin token.
    pub admin_token_hash: Box<str>,
}

impl Quiz {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Encodes the complete record.
    pub fn to_fields(&self) -> Vec<(Box<str>, Box<str>)> {
        let mut fields = Vec::with_capacity(12);
        fields.push(pair(field::ID, self.id.as_str()));
        fields.push(pair(field::JOIN_CODE, self.join_code.as_str()));
        fields.push(pair(field::TIMER_SECONDS_DEFAULT, self.timer_seconds_default.to_string()));
        fields.push(pair(field::QUESTION_COUNT, self.question_count.to_string()));
        fields.push(pair(field::VERSION, self.version.to_string()));
        fields.push(pair(field::PAYLOAD, self.payload.clone()));
        fields.push(pair(field::CREATED_AT, record::encode_timestamp(self.created_at)));
        fields.push(pair(field::EXPIRES_AT, record::encode_timestamp(self.expires_at)));
        fields.push(pair(field::ADMIN_TOKEN_HASH, self.admin_token_hash.clone()));
        fields.extend(self.progress_fields());
        fields
    }

    /// Encodes only the fields touched by state transitions.
    pub fn progress_fields(&self) -> [(Box<str>, Box<str>); 3] {
        [
            pair(field::STATE, self.state.as_str()),
            pair(field::CURRENT_QUESTION_INDEX, self.current_question_index.to_string()),
            pair(field::QUESTION_STARTED_AT, record::encode_optional_timestamp(self.question_started_at)),
        ]
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        let id = record::text(fields, field::ID)?.parse().map_err(|_| DecodeError { field: field::ID })?;
        let join_code =
            record::text(fields, field::JOIN_CODE)?.parse().map_err(|_| DecodeError { field: field::JOIN_CODE })?;
        let state = record::text(fields, field::STATE)?.parse().map_err(|_| DecodeError { field: field::STATE })?;
        Ok(Self {
            id,
            join_code,
            state,
            current_question_index: record::number(fields, field::CURRENT_QUESTION_INDEX)?,
            question_started_at: record::optional_timestamp(fields, field::QUESTION_STARTED_AT)?,
            timer_seconds_default: record::number(fields, field::TIMER_SECONDS_DEFAULT)?,
            question_count: record::number(fields, field::QUESTION_COUNT)?,
            version: record::number(fields, field::VERSION)?,
            payload: record::text(fields, field::PAYLOAD)?.into(),
            created_at: record::timestamp(fields, field::CREATED_AT)?,
            expires_at: record::timestamp(fields, field::EXPIRES_AT)?,
            admin_token_hash: record::text(fields, field::ADMIN_TOKEN_HASH)?.into(),
        })
    }
}
