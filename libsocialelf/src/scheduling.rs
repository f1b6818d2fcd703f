//! Parsing of human-readable schedule strings
//!
//! Every form is read relative to the acting user's timezone so that
//! "tomorrow 9am" means 9am where the user is, not 9am UTC.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::error::{Result, SocialElfError};
use crate::timezone::TimezoneResolver;

/// Parse a schedule string into a UTC instant
///
/// Supports, in order of precedence:
/// - Relative durations: "30m", "2h", "1day", "in 2h", "+45m"
/// - Absolute times: "2025-06-01 09:00", "2025-06-01T09:00", RFC 3339
/// - Natural language: "friday 3pm", "tomorrow"
pub fn parse_schedule(input: &str, tz: Tz) -> Result<DateTime<Utc>> {
    parse_schedule_at(input, tz, Utc::now())
}

/// Same as [`parse_schedule`] with an explicit reference instant
pub fn parse_schedule_at(input: &str, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SocialElfError::Validation(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Some(duration) = parse_relative(input)? {
        return Ok(now + duration);
    }

    if let Ok(instant) = TimezoneResolver::default().parse_absolute(input, tz) {
        return Ok(instant);
    }

    chrono_english::parse_date_string(input, now.with_timezone(&tz), chrono_english::Dialect::Us)
        .map(|local| local.with_timezone(&Utc))
        .map_err(|_| {
            SocialElfError::Validation(format!("Could not parse schedule string: {}", input))
        })
}

/// `Ok(None)` when the input is not a duration at all
fn parse_relative(input: &str) -> Result<Option<Duration>> {
    let trimmed = input
        .strip_prefix('+')
        .or_else(|| input.strip_prefix("in "))
        .unwrap_or(input)
        .trim();

    let Ok(std_duration) = humantime::parse_duration(trimmed) else {
        return Ok(None);
    };

    Duration::from_std(std_duration)
        .map(Some)
        .map_err(|_| SocialElfError::Validation(format!("Duration out of range: {}", input)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_durations() {
        let tz = chrono_tz::UTC;
        let now = reference();

        assert_eq!(parse_schedule_at("30m", tz, now).unwrap(), now + Duration::minutes(30));
        assert_eq!(parse_schedule_at("2h", tz, now).unwrap(), now + Duration::hours(2));
        assert_eq!(parse_schedule_at("1day", tz, now).unwrap(), now + Duration::days(1));
        assert_eq!(parse_schedule_at("in 2h", tz, now).unwrap(), now + Duration::hours(2));
        assert_eq!(parse_schedule_at("+45m", tz, now).unwrap(), now + Duration::minutes(45));
    }

    #[test]
    fn test_absolute_time_read_in_user_zone() {
        let tz = chrono_tz::America::New_York;
        let instant = parse_schedule_at("2025-06-11 09:00", tz, reference()).unwrap();
        // EDT is UTC-4 in June
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 6, 11, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_rfc3339_keeps_its_offset() {
        let instant =
            parse_schedule_at("2025-06-11T09:00:00+02:00", chrono_tz::Asia::Tokyo, reference())
                .unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 6, 11, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_natural_language_uses_user_zone() {
        let tz = chrono_tz::Europe::Berlin;
        let instant = parse_schedule_at("friday 3pm", tz, reference()).unwrap();
        let local = instant.with_timezone(&tz);

        assert_eq!(local.hour(), 15);
        assert!(instant > reference());
    }

    #[test]
    fn test_empty_string_rejected() {
        let err = parse_schedule("   ", chrono_tz::UTC).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_gibberish_rejected() {
        let err = parse_schedule("whenever you feel like it", chrono_tz::UTC).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
