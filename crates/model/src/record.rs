//! Explicit decoding of the untyped string maps read back from the store.
//!
//! Every numeric field is stored as its decimal representation, timestamps as epoch milliseconds, and an
//! empty string stands for "unset". Nothing outside this module should ever parse raw store values.

use chrono::{DateTime, Utc};
use core::fmt::{self, Display};
use core::str::FromStr;
use std::collections::HashMap;

/// A hash record exactly as it was read from the store.
pub type Fields = HashMap<Box<str>, Box<str>>;

/// A field that was either missing or held an unexpected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    pub field: &'static str,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed record field `{}`", self.field)
    }
}

impl std::error::Error for DecodeError {}

pub fn text<'f>(fields: &'f Fields, field: &'static str) -> Result<&'f str, DecodeError> {
    fields.get(field).map(AsRef::as_ref).ok_or(DecodeError { field })
}

pub fn number<T: FromStr>(fields: &Fields, field: &'static str) -> Result<T, DecodeError> {
    text(fields, field)?.parse().map_err(|_| DecodeError { field })
}

pub fn optional_number<T: FromStr>(fields: &Fields, field: &'static str) -> Result<Option<T>, DecodeError> {
    match text(fields, field)? {
        "" => Ok(None),
        raw => raw.parse().map(Some).map_err(|_| DecodeError { field }),
    }
}

pub fn timestamp(fields: &Fields, field: &'static str) -> Result<DateTime<Utc>, DecodeError> {
    let millis = number(fields, field)?;
    DateTime::from_timestamp_millis(millis).ok_or(DecodeError { field })
}

pub fn optional_timestamp(fields: &Fields, field: &'static str) -> Result<Option<DateTime<Utc>>, DecodeError> {
    let Some(millis) = optional_number(fields, field)? else {
        return Ok(None);
    };
    DateTime::from_timestamp_millis(millis).map(Some).ok_or(DecodeError { field })
}

pub fn encode_timestamp(at: DateTime<Utc>) -> Box<str> {
    at.timestamp_millis().to_string().into_boxed_str()
}

pub fn encode_optional_timestamp(at: Option<DateTime<Utc>>) -> Box<str> {
    at.map(encode_timestamp).unwrap_or_default()
}

pub fn encode_optional_number(value: Option<u32>) -> Box<str> {
    value.map(|num| num.to_string().into_boxed_str()).unwrap_or_default()
}

/// Convenience for building a `(field, value)` pair.
pub fn pair(field: &str, value: impl Into<Box<str>>) -> (Box<str>, Box<str>) {
    (field.into(), value.into())
}
