use core::fmt::{self, Display};
use core::str::FromStr;
use rand::Rng;
use serde::{Deserialize, Serialize};

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Upper-case alphanumerics without the look-alikes `0`, `O`, `1`, and `I`.
const JOIN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Identifier with the wrong length or an unexpected character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidId {
    pub kind: &'static str,
}

impl Display for InvalidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {}", self.kind)
    }
}

impl std::error::Error for InvalidId {}

fn generate(alphabet: &[u8], len: usize) -> Box<str> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())])).collect()
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $len:literal, $alphabet:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Box<str>);

        impl $name {
            pub const LEN: usize = $len;

            /// Draws a fresh random identifier.
            pub fn generate() -> Self {
                Self(generate($alphabet, Self::LEN))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;
            fn from_str(text: &str) -> Result<Self, Self::Err> {
                if text.len() == Self::LEN && text.bytes().all(|byte| $alphabet.contains(&byte)) {
                    Ok(Self(text.into()))
                } else {
                    Err(InvalidId { kind: $kind })
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidId;
            fn try_from(text: String) -> Result<Self, Self::Error> {
                text.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.into_string()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Public identifier of a quiz.
    QuizId, "quiz id", 10, ALPHANUMERIC
);

identifier!(
    /// Identity of a participant within one quiz, handed out on join.
    SessionId, "session id", 8, ALPHANUMERIC
);

identifier!(
    /// Short code that participants type in to find a quiz.
    JoinCode, "join code", 6, JOIN_ALPHABET
);

impl JoinCode {
    /// Parses user input, tolerating surrounding whitespace and lower-case letters.
    pub fn normalize(input: &str) -> Result<Self, InvalidId> {
        input.trim().to_ascii_uppercase().parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid() {
        for _ in 0..100 {
            let quiz = QuizId::generate();
            assert_eq!(quiz.as_str().len(), 10);
            assert_eq!(quiz.as_str().parse::<QuizId>().unwrap(), quiz);

            let session = SessionId::generate();
            assert_eq!(session.as_str().len(), 8);
            assert!(session.as_str().bytes().all(|b| b.is_ascii_alphanumeric()));

            let code = JoinCode::generate();
            assert_eq!(code.as_str().parse::<JoinCode>().unwrap(), code);
        }
    }

    #[test]
    fn join_codes_avoid_ambiguous_characters() {
        for _ in 0..200 {
            let code = JoinCode::generate();
            assert!(!code.as_str().contains(['0', 'O', '1', 'I']));
        }
        assert!("ABC0EF".parse::<JoinCode>().is_err());
        assert!("abcdef".parse::<JoinCode>().is_err());
        assert_eq!(JoinCode::normalize(" abcdef ").unwrap().as_str(), "ABCDEF");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("short".parse::<QuizId>().is_err());
        assert!("abcdefghijk".parse::<QuizId>().is_err());
        assert!("abcde-ghij".parse::<QuizId>().is_err());
        assert!("abcdefgh".parse::<QuizId>().is_err());
        assert!("abcdefgh".parse::<SessionId>().is_ok());
        assert!("abcd efg".parse::<SessionId>().is_err());
        assert_eq!("x".parse::<SessionId>(), Err(InvalidId { kind: "session id" }));
    }

    #[test]
    fn deserialization_validates() {
        let id: QuizId = serde_json::from_str("\"abcdefghij\"").unwrap();
        assert_eq!(id.as_str(), "abcdefghij");
        assert!(serde_json::from_str::<QuizId>("\"abc\"").is_err());
    }
}
