//! Sanitizing of raw numeric input.
//!
//! Invalid numbers never reject a command: they clamp to 0.

use crate::domain::commands::{CountInput, CountsInput, RawInputs, RollInput};
use crate::domain::roster::RosterCounts;

/// Parses a tier count the lenient way a number field is read: leading
/// whitespace, an optional sign, then as many digits as follow. Missing,
/// negative or zero values are 0; oversized values saturate.
#[must_use]
pub fn parse_count(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);

    if negative || digits.is_empty() {
        return 0;
    }
    digits.bytes().fold(0u32, |acc, digit| {
        acc.saturating_mul(10)
            .saturating_add(u32::from(digit - b'0'))
    })
}

/// Floors a numeric roll; non-finite or negative values become 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sanitize_roll(value: f64) -> u32 {
    if !value.is_finite() || value < 0.0 {
        return 0;
    }
    // Float-to-int `as` saturates at u32::MAX.
    value.floor() as u32
}

impl RollInput {
    /// The non-negative integer this roll stands for. Text is trimmed and
    /// read as a decimal number; empty or unparsable text is 0.
    #[must_use]
    pub fn sanitize(&self) -> u32 {
        match self {
            Self::Number(value) => sanitize_roll(*value),
            Self::Text(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return 0;
                }
                trimmed.parse::<f64>().map_or(0, sanitize_roll)
            }
        }
    }
}

impl CountInput {
    /// The non-negative count this input stands for.
    #[must_use]
    pub fn sanitize(&self) -> u32 {
        match self {
            Self::Number(value) => sanitize_roll(*value),
            Self::Text(raw) => parse_count(raw),
        }
    }
}

impl CountsInput {
    /// Sanitizes each tier; missing tiers are 0.
    #[must_use]
    pub fn counts(&self) -> RosterCounts {
        let of = |input: Option<&CountInput>| input.map_or(0, CountInput::sanitize);
        RosterCounts {
            powerful: of(self.powerful.as_ref()),
            strong: of(self.strong.as_ref()),
            regular: of(self.regular.as_ref()),
            easy: of(self.easy.as_ref()),
        }
    }
}

impl RawInputs {
    /// Parses the four count fields.
    #[must_use]
    pub fn counts(&self) -> RosterCounts {
        RosterCounts {
            powerful: parse_count(&self.powerful),
            strong: parse_count(&self.strong),
            regular: parse_count(&self.regular),
            easy: parse_count(&self.easy),
        }
    }

    /// The roll field as a roll input.
    #[must_use]
    pub fn roll_input(&self) -> RollInput {
        RollInput::Text(self.roll.clone())
    }
}
