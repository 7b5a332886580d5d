//! Expiry cycle arithmetic.
//!
//! NFO tradingsymbols embed the expiry cycle as `YYMON` (`SBIN25SEPFUT`,
//! `SBIN25SEP800CE`). [`ExpiryToken`] renders and parses that component.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::{Date, Month, Weekday};

use crate::{ResolveError, ValidationError};

const MONTH_CODES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Expiry cycle identifier rendered as two-digit year plus month code, e.g. `25SEP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpiryToken {
    year: i32,
    month: u8,
}

impl ExpiryToken {
    pub fn new(year: i32, month: u8) -> Result<Self, ResolveError> {
        if !(1..=12).contains(&month) || !(2000..=2099).contains(&year) {
            return Err(ResolveError::InvalidCycle { year, month });
        }
        Ok(Self { year, month })
    }

    /// Parses a rendered token (`25OCT`, case-insensitive), as used for month overrides.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidExpiryToken {
            value: input.to_owned(),
        };

        let normalized = input.trim().to_ascii_uppercase();
        if normalized.len() != 5 || !normalized.is_ascii() {
            return Err(invalid());
        }

        let (yy, code) = normalized.split_at(2);
        if !yy.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }
        let yy: i32 = yy.parse().map_err(|_| invalid())?;
        let month = MONTH_CODES
            .iter()
            .position(|candidate| *candidate == code)
            .ok_or_else(invalid)?;

        Ok(Self {
            year: 2000 + yy,
            month: month as u8 + 1,
        })
    }

    /// Cycle that contains `date`.
    pub fn for_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    /// Following monthly cycle.
    pub fn next(self) -> Result<Self, ResolveError> {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    pub const fn year(self) -> i32 {
        self.year
    }

    pub const fn month(self) -> u8 {
        self.month
    }

    pub fn month_code(self) -> &'static str {
        MONTH_CODES[usize::from(self.month - 1)]
    }

    /// Last occurrence of `weekday` in the cycle's month.
    pub fn last_weekday(self, weekday: Weekday) -> Date {
        let month = Month::try_from(self.month).unwrap_or(Month::January);
        let last_day = time::util::days_in_year_month(self.year, month);
        let mut date = Date::from_calendar_date(self.year, month, last_day)
            .unwrap_or(Date::MIN);
        while date.weekday() != weekday {
            match date.previous_day() {
                Some(previous) => date = previous,
                None => break,
            }
        }
        date
    }
}

impl Display for ExpiryToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}{}", self.year % 100, self.month_code())
    }
}

impl TryFrom<String> for ExpiryToken {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ExpiryToken> for String {
    fn from(value: ExpiryToken) -> Self {
        value.to_string()
    }
}

/// Derives the expiry token for a calendar cycle. `(2025, 9)` renders as `25SEP`.
pub fn resolve_cycle(year: i32, month: u8) -> Result<ExpiryToken, ResolveError> {
    ExpiryToken::new(year, month)
}

/// Earliest candidate expiry on or after `as_of`.
pub fn nearest_expiry_date(candidates: &[Date], as_of: Date) -> Result<Date, ResolveError> {
    candidates
        .iter()
        .copied()
        .filter(|candidate| *candidate >= as_of)
        .min()
        .ok_or(ResolveError::NoUpcomingExpiry { as_of })
}
