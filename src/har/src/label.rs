//! Set element labels and composite keys.
//!
//! Labels are compared and hashed ASCII case-insensitively (§4.C). Non-ASCII
//! labels are rejected at construction: the wire format is fixed-width ASCII,
//! so there is no defined behaviour for anything else (§9 open question 2).

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{HarError, Result};

/// A single axis label, e.g. one element of a named set.
#[derive(Debug, Clone, Eq)]
pub struct Label(String);

impl Label {
    pub fn new(value: impl Into<String>) -> Result<Label> {
        let value = value.into();
        if !value.is_ascii() {
            return Err(HarError::MalformedRecord {
                header: String::new(),
                reason: format!("label {value:?} contains non-ASCII characters"),
            });
        }
        Ok(Label(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.as_bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl From<&str> for Label {
    /// Infallible conversion for call sites that already know the label is
    /// ASCII (e.g. decoded from a fixed-width ASCII field). Non-ASCII bytes
    /// are replaced rather than panicking, since a `From` impl cannot fail.
    fn from(value: &str) -> Self {
        if value.is_ascii() {
            Label(value.to_string())
        } else {
            Label(value.chars().map(|c| if c.is_ascii() { c } else { '?' }).collect())
        }
    }
}

/// An ordered tuple of labels, one per axis, identifying a single element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySequence(Vec<Label>);

impl KeySequence {
    pub fn new(labels: Vec<Label>) -> KeySequence {
        KeySequence(labels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> &[Label] {
        &self.0
    }

    /// True if `self` begins with `prefix` (axis-wise, case-insensitive).
    pub fn starts_with(&self, prefix: &[Label]) -> bool {
        prefix.len() <= self.0.len() && self.0[..prefix.len()] == *prefix
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.0 {
            write!(f, "[{label}]")?;
        }
        Ok(())
    }
}
