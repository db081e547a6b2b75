//! The fixed five-day school week.
//!
//! Day names are stored and exchanged in Bulgarian, the language the menus are
//! published in. The declaration order of [`Weekday`] is the canonical ordering
//! used everywhere a sequence of days is persisted or reported.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A school day, Monday through Friday.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "Понеделник")]
    Monday,
    #[serde(rename = "Вторник")]
    Tuesday,
    #[serde(rename = "Сряда")]
    Wednesday,
    #[serde(rename = "Четвъртък")]
    Thursday,
    #[serde(rename = "Петък")]
    Friday,
}

impl Weekday {
    /// All school days in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
    ];

    /// The stored (Bulgarian) name of the day.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Monday => "Понеделник",
            Self::Tuesday => "Вторник",
            Self::Wednesday => "Сряда",
            Self::Thursday => "Четвъртък",
            Self::Friday => "Петък",
        }
    }

    /// Zero-based position within the week.
    #[must_use]
    pub const fn position(self) -> usize {
        self as usize
    }

    /// Parses a day name. Accepts the stored Bulgarian names and, for API
    /// convenience, case-insensitive English names.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if let Some(day) = Self::ALL.into_iter().find(|d| d.name() == trimmed) {
            return Ok(day);
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "monday" => Ok(Self::Monday),
            "tuesday" => Ok(Self::Tuesday),
            "wednesday" => Ok(Self::Wednesday),
            "thursday" => Ok(Self::Thursday),
            "friday" => Ok(Self::Friday),
            _ => Err(Error::UnknownDay {
                day: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weekday {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_bulgarian_and_english_names() {
        assert_eq!(Weekday::parse("Понеделник").unwrap(), Weekday::Monday);
        assert_eq!(Weekday::parse(" Петък ").unwrap(), Weekday::Friday);
        assert_eq!(Weekday::parse("Wednesday").unwrap(), Weekday::Wednesday);
        assert_eq!(Weekday::parse("thursday").unwrap(), Weekday::Thursday);
    }

    #[test]
    fn test_parse_rejects_weekend_and_garbage() {
        assert!(matches!(
            Weekday::parse("Събота"),
            Err(Error::UnknownDay { .. })
        ));
        assert!(matches!(Weekday::parse(""), Err(Error::UnknownDay { .. })));
    }

    #[test]
    fn test_canonical_order() {
        let mut days = vec![Weekday::Friday, Weekday::Monday, Weekday::Thursday];
        days.sort();
        assert_eq!(
            days,
            vec![Weekday::Monday, Weekday::Thursday, Weekday::Friday]
        );
        assert_eq!(Weekday::Wednesday.position(), 2);
    }

    #[test]
    fn test_serde_uses_stored_names() {
        let json = serde_json::to_string(&Weekday::Tuesday).unwrap();
        assert_eq!(json, "\"Вторник\"");
        let parsed: Weekday = serde_json::from_str("\"Сряда\"").unwrap();
        assert_eq!(parsed, Weekday::Wednesday);
    }
}
