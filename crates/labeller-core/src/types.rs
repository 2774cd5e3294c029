//! Strong type definitions for Labeller.
//!
//! All identifiers are newtypes to prevent mixing up user, visit and context
//! keys at compile time. They wrap `i64` because that is what the store
//! generates.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Store-generated primary key of a user.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-generated primary key of a visit row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisitId(pub i64);

impl fmt::Debug for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VisitId({})", self.0)
    }
}

/// Ordering key of a context. Contexts are delivered in ascending id order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub i64);

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

/// The highest label sequence index durably committed for a user.
///
/// `Checkpoint::NONE` (-1) means nothing has been committed yet, so the next
/// label lands at index 0 and the next context delivered is the first one
/// with an id above -1.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checkpoint(i64);

impl Checkpoint {
    /// No labels committed.
    pub const NONE: Self = Self(-1);

    /// Checkpoint at a committed sequence index.
    pub const fn at(index: i64) -> Self {
        Self(index)
    }

    /// Build from the last committed index, if any.
    pub fn from_last(last: Option<i64>) -> Self {
        last.map_or(Self::NONE, Self)
    }

    /// The raw index (-1 when nothing is committed).
    pub const fn index(&self) -> i64 {
        self.0
    }

    /// The sequence index the next committed label must take.
    pub const fn next_index(&self) -> i64 {
        self.0 + 1
    }

    pub const fn is_none(&self) -> bool {
        self.0 < 0
    }

    /// Checkpoint after `count` more labels are committed.
    pub const fn advance(&self, count: usize) -> Self {
        Self(self.0 + count as i64)
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoint({})", self.0)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Two-valued classifier shared by label fields and user types.
///
/// On the wire it is either the strings `"POSITIVE"` / `"NEGATIVE"` or a
/// JSON boolean, where `true` is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

/// The enrollment classifier of a user.
pub type UserType = Polarity;

impl Polarity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "POSITIVE",
            Polarity::Negative => "NEGATIVE",
        }
    }
}

impl From<bool> for Polarity {
    fn from(value: bool) -> Self {
        if value {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("POSITIVE") {
            Ok(Polarity::Positive)
        } else if s.eq_ignore_ascii_case("NEGATIVE") {
            Ok(Polarity::Negative)
        } else {
            Err(format!("unknown polarity {s:?}"))
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Polarity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolarityRepr {
    Flag(bool),
    Name(String),
}

impl<'de> Deserialize<'de> for Polarity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PolarityRepr::deserialize(deserializer)? {
            PolarityRepr::Flag(flag) => Ok(Polarity::from(flag)),
            PolarityRepr::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_none_starts_at_zero() {
        let cp = Checkpoint::from_last(None);
        assert!(cp.is_none());
        assert_eq!(cp.next_index(), 0);
        assert_eq!(cp.advance(3), Checkpoint::at(2));
    }

    #[test]
    fn test_polarity_accepts_bool_and_name() {
        let p: Polarity = serde_json::from_str("true").unwrap();
        assert_eq!(p, Polarity::Positive);
        let n: Polarity = serde_json::from_str("\"negative\"").unwrap();
        assert_eq!(n, Polarity::Negative);
        assert!(serde_json::from_str::<Polarity>("\"MAYBE\"").is_err());
        assert!(serde_json::from_str::<Polarity>("3").is_err());
    }

    #[test]
    fn test_polarity_serializes_as_name() {
        assert_eq!(serde_json::to_string(&Polarity::Positive).unwrap(), "\"POSITIVE\"");
    }
}
