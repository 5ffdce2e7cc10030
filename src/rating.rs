use crate::error::WorksheetError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A user-assigned score for one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rating {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
}

impl Rating {
    pub const ALL: [Rating; 5] = [
        Rating::One,
        Rating::Two,
        Rating::Three,
        Rating::Four,
        Rating::Five,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Parses form input where the empty string stands for "unrated".
    pub fn parse_optional(input: &str) -> Result<Option<Self>, WorksheetError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl TryFrom<u8> for Rating {
    type Error = WorksheetError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::One),
            2 => Ok(Rating::Two),
            3 => Ok(Rating::Three),
            4 => Ok(Rating::Four),
            5 => Ok(Rating::Five),
            other => Err(WorksheetError::InvalidRating(other.to_string())),
        }
    }
}

impl FromStr for Rating {
    type Err = WorksheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map_err(|_| WorksheetError::InvalidRating(s.to_string()))
            .and_then(|value| {
                Rating::try_from(value).map_err(|_| WorksheetError::InvalidRating(s.to_string()))
            })
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Rating::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Word key to rating; a missing key means unrated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ratings {
    entries: HashMap<String, Rating>,
}

impl Ratings {
    pub fn set(&mut self, word: impl Into<String>, rating: Rating) {
        self.entries.insert(word.into(), rating);
    }

    pub fn get(&self, word: &str) -> Option<Rating> {
        self.entries.get(word).copied()
    }

    pub fn remove(&mut self, word: &str) -> Option<Rating> {
        self.entries.remove(word)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
