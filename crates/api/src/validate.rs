use crate::error::{Error, Result};
use model::{MAX_NICKNAME_CHARS, TIMER_SECONDS};

/// Payloads are ciphertext, so only emptiness and size are checked.
pub fn payload(payload: &str, limit: usize) -> Result<()> {
    if payload.is_empty() {
        return Err(Error::invalid("payload must not be empty"));
    }
    if payload.len() > limit {
        return Err(Error::Validation(format!("payload exceeds {limit} bytes").into_boxed_str()));
    }
    Ok(())
}

pub fn timer(seconds: u32) -> Result<()> {
    if TIMER_SECONDS.contains(&seconds) {
        Ok(())
    } else {
        Err(Error::invalid("timer must be between 5 and 300 seconds"))
    }
}

pub fn timer_override(seconds: Option<u32>) -> Result<()> {
    seconds.map_or(Ok(()), timer)
}

/// Returns the trimmed nickname.
pub fn nickname(nickname: &str) -> Result<Box<str>> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid("nickname must not be empty"));
    }
    if trimmed.chars().count() > MAX_NICKNAME_CHARS {
        return Err(Error::invalid("nickname must be at most 32 characters"));
    }
    Ok(trimmed.into())
}
