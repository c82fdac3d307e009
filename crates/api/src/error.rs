use core::fmt::{self, Display};
use model::{DecodeError, InvalidId, QuizState};

/// Reasons an operation was refused because of where the quiz is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// The operation is only allowed in one particular state.
    Requires { required: QuizState, current: QuizState },
    /// The requested move is not in the transition table.
    Transition { from: QuizState, to: QuizState },
    NoQuestions,
    NoParticipants,
    NoMoreQuestions,
    NotCurrentQuestion { requested: u32, current: u32 },
}

impl Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requires { required, current } => {
                write!(f, "quiz must be in the {required} state but is currently {current}")
            }
            Self::Transition { from, to } => write!(f, "cannot move to {to} while the quiz is {from}"),
            Self::NoQuestions => f.write_str("quiz has no questions"),
            Self::NoParticipants => f.write_str("quiz has no participants"),
            Self::NoMoreQuestions => f.write_str("no more questions"),
            Self::NotCurrentQuestion { requested, current } => {
                write!(f, "question {requested} is not the current question (currently {current})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The named resource does not exist.
    NotFound(&'static str),
    /// The quiz outlived its expiration date.
    Expired,
    /// Presented credentials are not good enough.
    Forbidden(&'static str),
    StateConflict(Conflict),
    /// The named limit has been reached.
    Capacity(&'static str),
    /// An answer was already recorded for this question and session.
    Duplicate,
    /// Malformed identifier or unacceptable input.
    Validation(Box<str>),
    /// The store could not be reached.
    Unavailable,
    /// The store holds data we cannot make sense of.
    Fatal,
}

impl Error {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Expired => "EXPIRED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::StateConflict(_) => "STATE_CONFLICT",
            Self::Capacity(_) => "CAPACITY",
            Self::Duplicate => "DUPLICATE",
            Self::Validation(_) => "VALIDATION",
            Self::Unavailable => "UNAVAILABLE",
            Self::Fatal => "INTERNAL",
        }
    }

    pub(crate) fn invalid(message: &str) -> Self {
        Self::Validation(message.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Expired => f.write_str("quiz has expired"),
            Self::Forbidden(reason) => f.write_str(reason),
            Self::StateConflict(conflict) => Display::fmt(conflict, f),
            Self::Capacity(what) => write!(f, "{what} limit reached"),
            Self::Duplicate => f.write_str("answer already submitted for this question"),
            Self::Validation(message) => f.write_str(message),
            Self::Unavailable => f.write_str("store is temporarily unavailable"),
            Self::Fatal => f.write_str("Oops! We have encountered an unrecoverable error on our end."),
        }
    }
}

impl std::error::Error for Error {}

impl From<Conflict> for Error {
    fn from(conflict: Conflict) -> Self {
        Self::StateConflict(conflict)
    }
}

impl From<InvalidId> for Error {
    fn from(err: InvalidId) -> Self {
        Self::Validation(err.to_string().into_boxed_str())
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        log::error!("{err}");
        Self::Fatal
    }
}

impl From<db::error::Error> for Error {
    fn from(err: db::error::Error) -> Self {
        use db::error::Error::*;
        match err {
            Unavailable => Self::Unavailable,
            // Writes only ever depend on the quiz record.
            Missing => Self::NotFound("quiz"),
            AlreadyExists | WrongType | NoSuchKey => {
                log::error!("unexpected store failure: {err}");
                Self::Fatal
            }
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
