//! Naming scheme of every key that belongs to a quiz. All of them share the `quiz:{id}` prefix except the
//! join-code lookup, which has to be addressable by code alone.

use model::{JoinCode, QuizId, SessionId};

pub fn quiz(id: &QuizId) -> Box<str> {
    format!("quiz:{id}").into_boxed_str()
}

pub fn join_code(code: &JoinCode) -> Box<str> {
    format!("join:{code}").into_boxed_str()
}

pub fn question(id: &QuizId, index: u32) -> Box<str> {
    format!("quiz:{id}:question:{index}").into_boxed_str()
}

pub fn roster(id: &QuizId) -> Box<str> {
    format!("quiz:{id}:roster").into_boxed_str()
}

pub fn participant(id: &QuizId, session: &SessionId) -> Box<str> {
    format!("quiz:{id}:participant:{session}").into_boxed_str()
}

pub fn answer(id: &QuizId, index: u32, session: &SessionId) -> Box<str> {
    format!("quiz:{id}:answer:{index}:{session}").into_boxed_str()
}

pub fn order_log(id: &QuizId, index: u32) -> Box<str> {
    format!("quiz:{id}:order:{index}").into_boxed_str()
}

/// Pub/sub channel carrying change signals for a quiz.
pub fn channel(id: &QuizId) -> Box<str> {
    format!("quiz:{id}").into_boxed_str()
}
