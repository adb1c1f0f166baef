//! Human-readable sizes and durations for configuration and reports
//!
//! Both types parse from strings like `"5MB"` / `"30s"` and from bare
//! integers, so TOML and environment overrides can use either form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

const KIB: u64 = 1024;
const SIZE_UNITS: &[(&str, u64)] = &[
    ("TB", KIB * KIB * KIB * KIB),
    ("GB", KIB * KIB * KIB),
    ("MB", KIB * KIB),
    ("KB", KIB),
    ("B", 1),
];

const DURATION_UNITS: &[(&str, u64)] = &[("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)];

/// Split `"15MB"` into `(15, "MB")`; a bare number yields an empty unit
fn split_number(input: &str) -> Result<(u64, &str), ParseError> {
    let input = input.trim();
    let pos = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if pos == 0 {
        return Err(ParseError::InvalidFormat(input.to_string()));
    }
    Ok((input[..pos].parse()?, input[pos..].trim()))
}

/// Byte size wrapper with human-readable parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Largest unit that keeps the integer part non-zero, one decimal at most
    pub fn to_human_readable(&self) -> String {
        let (unit, divisor) = SIZE_UNITS
            .iter()
            .copied()
            .find(|&(_, divisor)| self.0 >= divisor)
            .unwrap_or(("B", 1));

        let whole = self.0 / divisor;
        let tenths = (self.0 % divisor) * 10 / divisor;
        if tenths == 0 {
            format!("{}{}", whole, unit)
        } else {
            format!("{}.{}{}", whole, tenths, unit)
        }
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, unit) = split_number(s)?;
        let multiplier = match unit.to_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => KIB * KIB,
            "G" | "GB" | "GIB" => KIB * KIB * KIB,
            "T" | "TB" | "TIB" => KIB * KIB * KIB * KIB,
            other => return Err(ParseError::InvalidUnit(other.to_string())),
        };
        Ok(ByteSize(num * multiplier))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

/// Duration with `"30s"`, `"5m"`, `"24h"`, `"7d"` parsing; bare numbers are seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, unit) = split_number(s)?;
        let unit = if unit.is_empty() { "s" } else { unit };
        let secs = DURATION_UNITS
            .iter()
            .find(|(name, _)| *name == unit.to_lowercase())
            .map(|(_, secs)| *secs)
            .ok_or_else(|| ParseError::InvalidUnit(unit.to_string()))?;
        Ok(Self::from_secs(num * secs))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let (unit, per) = DURATION_UNITS
            .iter()
            .copied()
            .find(|&(_, per)| secs >= per && secs % per == 0)
            .unwrap_or(("s", 1));
        write!(f, "{}{}", secs / per, unit)
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Shared visitor: integers are taken as-is, strings go through `FromStr`
macro_rules! human_deserialize {
    ($ty:ty, $expecting:literal, $from_int:expr) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                struct Visitor;

                impl<'de> serde::de::Visitor<'de> for Visitor {
                    type Value = $ty;

                    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                        Ok($from_int(v))
                    }

                    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                        u64::try_from(v)
                            .map($from_int)
                            .map_err(|_| E::custom("value must not be negative"))
                    }

                    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                        v.parse::<$ty>().map_err(E::custom)
                    }
                }

                deserializer.deserialize_any(Visitor)
            }
        }
    };
}

human_deserialize!(
    ByteSize,
    "a byte size as string (e.g., \"5MB\", \"1GB\") or integer",
    ByteSize
);
human_deserialize!(
    HumanDuration,
    "a duration as string (e.g., \"30s\", \"24h\") or integer seconds",
    HumanDuration::from_secs
);
