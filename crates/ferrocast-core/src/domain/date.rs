use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

use crate::{UtcDateTime, ValidationError};

/// Calendar day of a daily bar, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradingDate(Date);

impl TradingDate {
    pub const fn new(date: Date) -> Self {
        Self(date)
    }

    /// Current UTC calendar day.
    pub fn today() -> Self {
        UtcDateTime::now().trading_date()
    }

    /// Yesterday in UTC. Today's session may still be open, so this is the
    /// newest day whose bar is final.
    pub fn last_completed_day() -> Self {
        Self::today().add_days(-1)
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    /// UTC calendar day of a unix timestamp (seconds).
    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(|value| Self(value.date()))
            .map_err(|_| ValidationError::InvalidDate {
                value: seconds.to_string(),
            })
    }

    /// Unix timestamp of midnight UTC at the start of this day.
    pub fn unix_midnight(self) -> i64 {
        self.0.midnight().assume_utc().unix_timestamp()
    }

    pub fn into_inner(self) -> Date {
        self.0
    }

    /// Signed number of calendar days from `self` to `later`.
    pub fn days_until(self, later: Self) -> i64 {
        (later.0 - self.0).whole_days()
    }

    pub fn checked_add_days(self, days: i64) -> Option<Self> {
        self.0.checked_add(Duration::days(days)).map(Self)
    }

    /// Shift by a signed number of calendar days. Returns `self` unchanged
    /// when the result would leave the supported calendar.
    pub fn add_days(self, days: i64) -> Self {
        self.checked_add_days(days).unwrap_or(self)
    }

    /// Following calendar day, `None` past the last supported date.
    pub fn next_day(self) -> Option<Self> {
        self.checked_add_days(1)
    }

    pub fn format(self) -> String {
        self.0
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_else(|_| self.0.to_string())
    }
}

impl Display for TradingDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for TradingDate {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for TradingDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format())
    }
}

impl<'de> Deserialize<'de> for TradingDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_iso_day() {
        let date = TradingDate::parse("2024-02-29").expect("leap day");
        assert_eq!(date.to_string(), "2024-02-29");
        assert_eq!(date.next_day().expect("next").to_string(), "2024-03-01");
    }

    #[test]
    fn shifting_past_calendar_end_is_detected() {
        let last = TradingDate::new(Date::MAX);
        assert_eq!(last.next_day(), None);
        assert_eq!(last.add_days(1), last);
        assert!(TradingDate::last_completed_day() < TradingDate::today());
    }

    #[test]
    fn counts_calendar_days() {
        let start = TradingDate::parse("2024-01-01").expect("date");
        let end = TradingDate::parse("2024-01-31").expect("date");
        assert_eq!(start.days_until(end), 30);
        assert_eq!(end.days_until(start), -30);
    }

    #[test]
    fn unix_round_trip_lands_on_same_day() {
        let date = TradingDate::parse("2023-06-15").expect("date");
        let back = TradingDate::from_unix_timestamp(date.unix_midnight() + 13 * 3600)
            .expect("timestamp");
        assert_eq!(back, date);
    }

    #[test]
    fn rejects_malformed_day() {
        let err = TradingDate::parse("15/06/2023").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }
}
