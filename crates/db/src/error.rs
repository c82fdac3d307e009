use core::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The object we are trying to insert already exists.
    AlreadyExists,
    /// A command was issued against a key that holds another kind of value.
    WrongType,
    /// The key we are trying to move does not exist.
    NoSuchKey,
    /// A key the write depends on is gone, so nothing was written.
    Missing,
    /// The store cannot serve requests right now.
    Unavailable,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyExists => "key already exists",
            Self::WrongType => "operation against a key holding the wrong kind of value",
            Self::NoSuchKey => "no such key",
            Self::Missing => "required key is missing",
            Self::Unavailable => "store unavailable",
        })
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
