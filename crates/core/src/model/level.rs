use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LevelError {
    #[error("invalid level tier: {0}")]
    InvalidTier(u8),
    #[error("unrecognized level: {0}")]
    Unrecognized(String),
}

/// Session duration for the three lower tiers, in seconds.
pub const LOWER_TIER_DURATION_SECS: u32 = 1800;
/// Session duration for the three upper tiers, in seconds.
pub const UPPER_TIER_DURATION_SECS: u32 = 2400;

/// Six ordered difficulty tiers. The tier fixes the total session duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Hsk1,
    Hsk2,
    Hsk3,
    Hsk4,
    Hsk5,
    Hsk6,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Hsk1,
        Level::Hsk2,
        Level::Hsk3,
        Level::Hsk4,
        Level::Hsk5,
        Level::Hsk6,
    ];

    /// Converts a 1-based tier number to a `Level`.
    ///
    /// # Errors
    ///
    /// Returns `LevelError::InvalidTier` outside 1..=6.
    pub fn from_tier(tier: u8) -> Result<Self, LevelError> {
        match tier {
            1 => Ok(Self::Hsk1),
            2 => Ok(Self::Hsk2),
            3 => Ok(Self::Hsk3),
            4 => Ok(Self::Hsk4),
            5 => Ok(Self::Hsk5),
            6 => Ok(Self::Hsk6),
            _ => Err(LevelError::InvalidTier(tier)),
        }
    }

    #[must_use]
    pub fn tier(self) -> u8 {
        match self {
            Level::Hsk1 => 1,
            Level::Hsk2 => 2,
            Level::Hsk3 => 3,
            Level::Hsk4 => 4,
            Level::Hsk5 => 5,
            Level::Hsk6 => 6,
        }
    }

    /// Total time allowed for a session at this level, in seconds.
    #[must_use]
    pub fn total_duration_secs(self) -> u32 {
        if self.tier() <= 3 {
            LOWER_TIER_DURATION_SECS
        } else {
            UPPER_TIER_DURATION_SECS
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HSK{}", self.tier())
    }
}

impl FromStr for Level {
    type Err = LevelError;

    /// Accepts `HSK3`, `hsk3`, `hsk 3` or a bare `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let digits = normalized
            .strip_prefix("hsk")
            .unwrap_or(normalized.as_str())
            .trim();
        let tier: u8 = digits
            .parse()
            .map_err(|_| LevelError::Unrecognized(s.to_string()))?;
        Self::from_tier(tier)
    }
}
