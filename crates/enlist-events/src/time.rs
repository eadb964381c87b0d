//! Campaign Time
//!
//! Day-and-hour campaign clock used for stamping muster records.
//!
//! # Example
//!
//! ```
//! use enlist_events::CampaignTime;
//!
//! let t = CampaignTime::new(12, 6);
//! assert_eq!(t.to_string(), "day_12.hour_06");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of hours in one campaign day.
pub const HOURS_PER_DAY: u8 = 24;

/// A point on the campaign calendar.
///
/// Serializes to strings like "day_12.hour_06".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CampaignTime {
    pub day: u32,
    pub hour: u8,
}

impl CampaignTime {
    /// Creates a new time. Hours past the end of the day roll into the next day.
    pub fn new(day: u32, hour: u8) -> Self {
        Self {
            day: day + u32::from(hour / HOURS_PER_DAY),
            hour: hour % HOURS_PER_DAY,
        }
    }

    /// Midnight of the given day.
    pub fn start_of_day(day: u32) -> Self {
        Self { day, hour: 0 }
    }

    /// Advances the clock by one hour, handling day rollover.
    pub fn advance_hour(&mut self) {
        self.hour += 1;
        if self.hour >= HOURS_PER_DAY {
            self.hour = 0;
            self.day += 1;
        }
    }

    /// Whole days elapsed since `earlier`, saturating at zero.
    pub fn days_since(&self, earlier_day: u32) -> u32 {
        self.day.saturating_sub(earlier_day)
    }
}

impl fmt::Display for CampaignTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day_{}.hour_{:02}", self.day, self.hour)
    }
}

/// Error type for parsing CampaignTime from strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseTimeError {
    InvalidFormat(String),
    InvalidDay(String),
    InvalidHour(String),
}

impl fmt::Display for ParseTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseTimeError::InvalidFormat(s) => {
                write!(f, "invalid time format: '{}', expected 'day_N.hour_HH'", s)
            }
            ParseTimeError::InvalidDay(s) => write!(f, "invalid day: '{}'", s),
            ParseTimeError::InvalidHour(s) => write!(f, "invalid hour: '{}'", s),
        }
    }
}

impl std::error::Error for ParseTimeError {}

impl FromStr for CampaignTime {
    type Err = ParseTimeError;

    /// Parses a CampaignTime from a string like "day_12.hour_06".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day_part, hour_part) = s
            .split_once('.')
            .ok_or_else(|| ParseTimeError::InvalidFormat(s.to_string()))?;

        let day = day_part
            .strip_prefix("day_")
            .ok_or_else(|| ParseTimeError::InvalidFormat(s.to_string()))?
            .parse::<u32>()
            .map_err(|_| ParseTimeError::InvalidDay(day_part.to_string()))?;

        let hour = hour_part
            .strip_prefix("hour_")
            .ok_or_else(|| ParseTimeError::InvalidFormat(s.to_string()))?
            .parse::<u8>()
            .map_err(|_| ParseTimeError::InvalidHour(hour_part.to_string()))?;
        if hour >= HOURS_PER_DAY {
            return Err(ParseTimeError::InvalidHour(hour_part.to_string()));
        }

        Ok(CampaignTime { day, hour })
    }
}

// Serialize as a string, same as the Display form
impl Serialize for CampaignTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CampaignTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
