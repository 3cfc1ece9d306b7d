//! Textual date formats used by normalized reviews.
//!
//! Stay dates are rendered as `"Sep 01, 2025"`; system timestamps as
//! `"September 01, 2025 at 09:00 AM"`. Parsing never fails loudly: input that
//! matches none of the accepted formats yields `None`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Output format for the review's stay date.
pub const STAY_DATE_FORMAT: &str = "%b %d, %Y";

/// Output format for `firstSeen`, `lastUpdated` and `scrapedAt`.
pub const SYSTEM_TIMESTAMP_FORMAT: &str = "%B %d, %Y at %I:%M %p";

const STAY_DATE_FORMATS: [&str; 3] = [STAY_DATE_FORMAT, "%B %d, %Y", "%Y-%m-%d"];

const SYSTEM_TIMESTAMP_FORMATS: [&str; 3] = [
    SYSTEM_TIMESTAMP_FORMAT,
    "%b %d, %Y at %I:%M %p",
    "%Y-%m-%dT%H:%M:%S",
];

/// Time of day stamped onto the posted date for `firstSeen`.
pub const FIRST_SEEN_TIME: (u32, u32) = (9, 0);
/// Time of day stamped onto the posted date for `lastUpdated`.
pub const LAST_UPDATED_TIME: (u32, u32) = (12, 0);
/// Time of day stamped onto the posted date for `scrapedAt`.
pub const SCRAPED_AT_TIME: (u32, u32) = (18, 0);

#[must_use]
pub fn parse_stay_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    STAY_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
}

#[must_use]
pub fn parse_system_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    SYSTEM_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
}

#[must_use]
pub fn format_stay_date(date: NaiveDate) -> String {
    date.format(STAY_DATE_FORMAT).to_string()
}

#[must_use]
pub fn format_system_timestamp(ts: NaiveDateTime) -> String {
    ts.format(SYSTEM_TIMESTAMP_FORMAT).to_string()
}

/// Stamp a fixed `(hour, minute)` onto the date part of `posted`.
#[must_use]
pub fn at_time_of_day(posted: NaiveDateTime, (hour, minute): (u32, u32)) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    posted.date().and_time(time)
}

/// Serde adapter for `Option<NaiveDate>` in the `"MMM DD, YYYY"` form.
///
/// Deserialization is lenient: unparseable strings become `None`.
pub mod stay_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => s.serialize_str(&super::format_stay_date(*date)),
            None => s.serialize_none(),
        }
    }

    /// # Errors
    ///
    /// Fails only when the input is neither a string nor null.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(super::parse_stay_date))
    }
}

/// Serde adapter for `Option<NaiveDateTime>` in the
/// `"Month DD, YYYY at hh:mm AM/PM"` form.
pub mod system_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => s.serialize_str(&super::format_system_timestamp(*ts)),
            None => s.serialize_none(),
        }
    }

    /// # Errors
    ///
    /// Fails only when the input is neither a string nor null.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().and_then(super::parse_system_timestamp))
    }
}
