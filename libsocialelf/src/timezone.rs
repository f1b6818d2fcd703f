//! Conversions between a user's IANA timezone and UTC instants
//!
//! Posts are stored and sent to the provider as UTC. The acting user's zone
//! decides how wall-clock input is read and how instants are displayed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{Result, SocialElfError};

pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Wall-clock formats accepted for local input, tried in order
const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, Copy)]
pub struct TimezoneResolver {
    default_zone: Tz,
}

impl Default for TimezoneResolver {
    fn default() -> Self {
        Self {
            default_zone: chrono_tz::America::New_York,
        }
    }
}

impl TimezoneResolver {
    pub fn new(default_zone: &str) -> Result<Self> {
        Ok(Self {
            default_zone: Self::parse_zone(default_zone)?,
        })
    }

    pub fn default_zone(&self) -> Tz {
        self.default_zone
    }

    pub fn parse_zone(name: &str) -> Result<Tz> {
        name.trim().parse::<Tz>().map_err(|_| {
            SocialElfError::Validation(format!("Unknown timezone '{}'", name.trim()))
        })
    }

    /// The user's zone, or the default when unset or unrecognised
    pub fn resolve(&self, user_setting: Option<&str>) -> Tz {
        match user_setting.map(str::trim).filter(|s| !s.is_empty()) {
            None => self.default_zone,
            Some(name) => Self::parse_zone(name).unwrap_or_else(|_| {
                warn!(timezone = name, fallback = %self.default_zone, "unknown profile timezone");
                self.default_zone
            }),
        }
    }

    /// Wall-clock time in `tz` to a UTC instant.
    ///
    /// A time repeated by a DST fall-back resolves to its earlier occurrence;
    /// a time skipped by spring-forward is rejected.
    pub fn to_utc(&self, local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
        tz.from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                SocialElfError::Validation(format!("{} does not exist in {}", local, tz.name()))
            })
    }

    pub fn to_local(&self, instant: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
        instant.with_timezone(&tz)
    }

    pub fn local_date(&self, instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
        self.to_local(instant, tz).date_naive()
    }

    /// `date` at `time` in `tz`
    pub fn at(&self, date: NaiveDate, time: NaiveTime, tz: Tz) -> Result<DateTime<Utc>> {
        self.to_utc(date.and_time(time), tz)
    }

    pub fn format_local(&self, instant: DateTime<Utc>, tz: Tz) -> String {
        self.to_local(instant, tz)
            .format("%Y-%m-%d %H:%M %Z")
            .to_string()
    }

    /// Parse an absolute time.
    ///
    /// RFC 3339 input keeps its own offset; bare wall-clock input is read in `tz`.
    pub fn parse_absolute(&self, input: &str, tz: Tz) -> Result<DateTime<Utc>> {
        let input = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Ok(dt.with_timezone(&Utc));
        }

        LOCAL_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
            .ok_or_else(|| {
                SocialElfError::Validation(format!("Could not parse date and time '{}'", input))
            })
            .and_then(|local| self.to_utc(local, tz))
    }
}
