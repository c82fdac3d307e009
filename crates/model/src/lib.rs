pub mod answer;
pub mod id;
pub mod participant;
pub mod question;
pub mod quiz;
pub mod record;
pub mod snapshot;
pub mod state;

pub use answer::Answer;
pub use id::{InvalidId, JoinCode, QuizId, SessionId};
pub use participant::Participant;
pub use question::Question;
pub use quiz::Quiz;
pub use record::{DecodeError, Fields};
pub use snapshot::{CurrentQuestion, QuizSummary, Snapshot};
pub use state::QuizState;

pub use chrono::{DateTime, Utc};

/// Maximum number of questions in a single quiz.
pub const MAX_QUESTIONS: u32 = 50;
/// Maximum number of participants that may join a single quiz.
pub const MAX_PARTICIPANTS: u32 = 50;

/// Maximum size (in bytes) of the encrypted quiz payload.
pub const MAX_QUIZ_PAYLOAD: usize = 65_536;
/// Maximum size (in bytes) of an encrypted question payload.
pub const MAX_QUESTION_PAYLOAD: usize = 16_384;
/// Maximum size (in bytes) of an encrypted answer payload.
pub const MAX_ANSWER_PAYLOAD: usize = 4_096;

/// Acceptable question timers (in seconds), both for the quiz default and per-question overrides.
pub const TIMER_SECONDS: core::ops::RangeInclusive<u32> = 5..=300;
/// Acceptable lifetimes (in hours) of a quiz before it expires.
pub const EXPIRATION_HOURS: core::ops::RangeInclusive<u32> = 1..=168;
/// Lifetime used when the creator does not ask for one.
pub const DEFAULT_EXPIRATION_HOURS: u32 = 24;
/// Maximum nickname length in characters (after trimming).
pub const MAX_NICKNAME_CHARS: usize = 32;
