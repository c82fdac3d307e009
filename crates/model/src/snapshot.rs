use crate::{
    answer::Answer,
    id::{JoinCode, QuizId},
    participant::Participant,
    question::Question,
    quiz::Quiz,
    state::QuizState,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything about a quiz that admins and participants are allowed to see.
/// The admin token digest is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizSummary {
    pub id: QuizId,
    pub join_code: JoinCode,
    pub state: QuizState,
    pub current_question_index: u32,
    pub question_started_at: Option<DateTime<Utc>>,
    pub timer_seconds_default: u32,
    pub question_count: u32,
    pub participant_count: u32,
    pub version: u64,
    pub payload: Box<str>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QuizSummary {
    pub fn new(quiz: &Quiz, participant_count: u32) -> Self {
        Self {
            id: quiz.id.clone(),
            join_code: quiz.join_code.clone(),
            state: quiz.state,
            current_question_index: quiz.current_question_index,
            question_started_at: quiz.question_started_at,
            timer_seconds_default: quiz.timer_seconds_default,
            question_count: quiz.question_count,
            participant_count,
            version: quiz.version,
            payload: quiz.payload.clone(),
            created_at: quiz.created_at,
            expires_at: quiz.expires_at,
        }
    }
}

/// The question currently being played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentQuestion {
    pub index: u32,
    pub payload: Box<str>,
    /// Override if present, otherwise the quiz default.
    pub timer_seconds: u32,
    /// Cleared once results are shown.
    pub started_at: Option<DateTime<Utc>>,
    pub answer_count: u32,
}

/// Full recomputed view of a quiz. Subscribers always receive one of these, never a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub quiz: QuizSummary,
    /// In join order.
    pub participants: Vec<Participant>,
    /// Present in the lobby once at least one question exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    /// Present while `active` or `results`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentQuestion>,
    /// Answers to the current question in arrival order. Present while `results` or `finished`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<Answer>>,
}
