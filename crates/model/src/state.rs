use core::fmt::{self, Display};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Lifecycle of a quiz. The only legal moves are:
///
/// ```text
/// lobby -> active -> results -> finished -> lobby
///                      |  ^
///                      v  |
///                     active
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizState {
    /// Questions may be edited and participants may join.
    Lobby,
    /// A question is open for answers.
    Active,
    /// Answers to the current question are revealed.
    Results,
    /// The last question has been revealed.
    Finished,
}

impl QuizState {
    pub const ALL: [Self; 4] = [Self::Lobby, Self::Active, Self::Results, Self::Finished];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Active => "active",
            Self::Results => "results",
            Self::Finished => "finished",
        }
    }

    pub const fn can_transition(self, to: Self) -> bool {
        use QuizState::*;
        matches!(
            (self, to),
            (Lobby, Active) | (Active, Results) | (Results, Active) | (Results, Finished) | (Finished, Lobby)
        )
    }
}

impl Display for QuizState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown state name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownState;

impl FromStr for QuizState {
    type Err = UnknownState;
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|state| state.as_str() == text).ok_or(UnknownState)
    }
}
