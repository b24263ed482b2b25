//! Administrative level tags (ADM0..ADM4) and user-input normalisation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AdmLevel {
    #[serde(rename = "ADM0")]
    Adm0,
    #[serde(rename = "ADM1")]
    Adm1,
    #[serde(rename = "ADM2")]
    Adm2,
    #[serde(rename = "ADM3")]
    Adm3,
    #[serde(rename = "ADM4")]
    Adm4,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ADM input '{input}': expected ADM0-ADM4 or a digit 0-4")]
pub struct AdmLevelError {
    pub input: String,
}

impl AdmLevel {
    /// Fixed collection order.
    pub const ALL: [AdmLevel; 5] = [
        AdmLevel::Adm0,
        AdmLevel::Adm1,
        AdmLevel::Adm2,
        AdmLevel::Adm3,
        AdmLevel::Adm4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adm0 => "ADM0",
            Self::Adm1 => "ADM1",
            Self::Adm2 => "ADM2",
            Self::Adm3 => "ADM3",
            Self::Adm4 => "ADM4",
        }
    }

    pub fn depth(&self) -> u8 {
        match self {
            Self::Adm0 => 0,
            Self::Adm1 => 1,
            Self::Adm2 => 2,
            Self::Adm3 => 3,
            Self::Adm4 => 4,
        }
    }

    fn from_depth(depth: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(depth).ok()?).copied()
    }
}

impl fmt::Display for AdmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdmLevel {
    type Err = AdmLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_adm_level(s)
    }
}

/// Accepts `"ADM2"` in any case, or a bare digit such as `"2"`. Exactly one
/// digit is allowed, so `"ADM02"` and `"04"` are rejected.
pub fn normalize_adm_level(input: &str) -> Result<AdmLevel, AdmLevelError> {
    let invalid = || AdmLevelError {
        input: input.to_string(),
    };
    let upper = input.trim().to_ascii_uppercase();
    let digits = upper.strip_prefix("ADM").unwrap_or(&upper);
    let mut chars = digits.chars();
    let depth = match (chars.next(), chars.next()) {
        (Some(digit), None) => digit.to_digit(10).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    AdmLevel::from_depth(depth).ok_or_else(invalid)
}
