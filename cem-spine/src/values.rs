//! Wire value codecs
//!
//! - `ScaledNumber`: mantissa + decimal exponent, converted to/from `f64`
//! - `DurationType`: ISO-8601 duration text (`-P1DT2H30M1.5S`)
//! - `AbsoluteOrRelativeTime`: RFC-3339 timestamp or a duration relative to now
//!
//! The duration grammar is parsed with nom combinators.

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use nom::{
    branch::alt,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_WEEK: f64 = 7.0;
const DAYS_PER_MONTH: f64 = 30.0;
const DAYS_PER_YEAR: f64 = 365.0;

/// Largest magnitude accepted for a duration (roughly 31k years)
const MAX_DURATION_SECONDS: f64 = 1e12;

/// Finest decimal exponent produced by `ScaledNumber::from_f64`
const MIN_SCALE: i8 = -4;

/// Errors decoding wire values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),
}

// ============================================================================
// Scaled numbers
// ============================================================================

/// Decimal number transported as `number * 10^scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScaledNumber {
    pub number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i8>,
}

impl ScaledNumber {
    pub fn new(number: i64, scale: i8) -> Self {
        Self {
            number,
            scale: if scale == 0 { None } else { Some(scale) },
        }
    }

    /// Encode a float with the coarsest scale that represents it (at most 4 decimals)
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self::new(0, 0);
        }

        for decimals in 0..=-MIN_SCALE {
            let mantissa = value * 10f64.powi(decimals as i32);
            if (mantissa - mantissa.round()).abs() < 1e-6 {
                return Self::new(mantissa.round() as i64, -decimals);
            }
        }

        let mantissa = value * 10f64.powi(-MIN_SCALE as i32);
        Self::new(mantissa.round() as i64, MIN_SCALE)
    }

    /// Decoded floating point value
    pub fn value(&self) -> f64 {
        let scale = self.scale.unwrap_or(0) as i32;
        if scale < 0 {
            // Division keeps values such as 0.3 exact
            self.number as f64 / 10f64.powi(-scale)
        } else {
            self.number as f64 * 10f64.powi(scale)
        }
    }
}

impl From<f64> for ScaledNumber {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

// ============================================================================
// Durations
// ============================================================================

/// ISO-8601 duration text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationType(pub String);

impl DurationType {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(render_duration(false, duration))
    }

    pub fn from_signed(duration: ChronoDuration) -> Self {
        if duration < ChronoDuration::zero() {
            let magnitude = (-duration).to_std().unwrap_or_default();
            Self(render_duration(true, magnitude))
        } else {
            Self(render_duration(false, duration.to_std().unwrap_or_default()))
        }
    }

    /// Signed duration encoded by the text
    pub fn duration(&self) -> Result<ChronoDuration, CodecError> {
        parse_duration(&self.0)
    }

    /// Non-negative duration encoded by the text
    pub fn std_duration(&self) -> Result<Duration, CodecError> {
        self.duration()?
            .to_std()
            .map_err(|_| CodecError::OutOfRange(self.0.clone()))
    }
}

impl From<Duration> for DurationType {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

#[derive(Debug, Default)]
struct DurationComponents {
    negative: bool,
    time_designator: bool,
    years: Option<f64>,
    months: Option<f64>,
    weeks: Option<f64>,
    days: Option<f64>,
    hours: Option<f64>,
    minutes: Option<f64>,
    seconds: Option<f64>,
}

impl DurationComponents {
    fn is_empty(&self) -> bool {
        self.date_is_empty() && self.time_is_empty()
    }

    fn date_is_empty(&self) -> bool {
        self.years.is_none() && self.months.is_none() && self.weeks.is_none() && self.days.is_none()
    }

    fn time_is_empty(&self) -> bool {
        self.hours.is_none() && self.minutes.is_none() && self.seconds.is_none()
    }

    fn total_seconds(&self) -> f64 {
        let days = self.years.unwrap_or(0.0) * DAYS_PER_YEAR
            + self.months.unwrap_or(0.0) * DAYS_PER_MONTH
            + self.weeks.unwrap_or(0.0) * DAYS_PER_WEEK
            + self.days.unwrap_or(0.0);

        let total = days * SECONDS_PER_DAY
            + self.hours.unwrap_or(0.0) * SECONDS_PER_HOUR
            + self.minutes.unwrap_or(0.0) * SECONDS_PER_MINUTE
            + self.seconds.unwrap_or(0.0);

        if self.negative {
            -total
        } else {
            total
        }
    }
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(pair(digit1, opt(pair(alt((char('.'), char(','))), digit1)))),
        |text: &str| text.replace(',', ".").parse::<f64>(),
    )(input)
}

fn component<'a>(designator: char) -> impl FnMut(&'a str) -> IResult<&'a str, Option<f64>> {
    opt(terminated(number, char(designator)))
}

fn iso_duration(input: &str) -> IResult<&str, DurationComponents> {
    let (input, sign) = opt(char('-'))(input)?;
    let (input, _) = char('P')(input)?;
    let (input, (years, months, weeks, days)) = tuple((
        component('Y'),
        component('M'),
        component('W'),
        component('D'),
    ))(input)?;
    let (input, time) = opt(preceded(
        char('T'),
        tuple((component('H'), component('M'), component('S'))),
    ))(input)?;

    let (hours, minutes, seconds) = time.unwrap_or((None, None, None));

    Ok((
        input,
        DurationComponents {
            negative: sign.is_some(),
            time_designator: time.is_some(),
            years,
            months,
            weeks,
            days,
            hours,
            minutes,
            seconds,
        },
    ))
}

fn parse_duration(text: &str) -> Result<ChronoDuration, CodecError> {
    let invalid = || CodecError::InvalidDuration(text.to_string());

    let (_, components) = all_consuming(iso_duration)(text.trim()).map_err(|_| invalid())?;

    if components.is_empty() || (components.time_designator && components.time_is_empty()) {
        return Err(invalid());
    }

    let total = components.total_seconds();
    if !total.is_finite() || total.abs() > MAX_DURATION_SECONDS {
        return Err(CodecError::OutOfRange(text.to_string()));
    }

    Ok(ChronoDuration::microseconds((total * 1e6).round() as i64))
}

fn render_duration(negative: bool, duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    let mut out = String::new();
    if negative && !duration.is_zero() {
        out.push('-');
    }
    out.push('P');

    if days > 0 {
        out.push_str(&format!("{}D", days));
    }

    let has_time = hours > 0 || minutes > 0 || seconds > 0 || millis > 0;
    if has_time || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if millis > 0 {
            let fraction = format!("{:03}", millis);
            out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
        } else if seconds > 0 || !has_time {
            out.push_str(&format!("{}S", seconds));
        }
    }

    out
}

// ============================================================================
// Points in time
// ============================================================================

/// Either an RFC-3339 timestamp or an ISO-8601 duration relative to now
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbsoluteOrRelativeTime(pub String);

impl AbsoluteOrRelativeTime {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(render_duration(false, duration))
    }

    pub fn from_time(time: DateTime<Utc>) -> Self {
        Self(time.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn is_relative(&self) -> bool {
        parse_duration(&self.0).is_ok()
    }

    /// Offset from `now`; relative values are returned as-is
    pub fn duration_at(&self, now: DateTime<Utc>) -> Result<ChronoDuration, CodecError> {
        if let Ok(duration) = parse_duration(&self.0) {
            return Ok(duration);
        }
        Ok(parse_time(&self.0)? - now)
    }

    pub fn duration(&self) -> Result<ChronoDuration, CodecError> {
        self.duration_at(Utc::now())
    }

    /// Absolute time, resolving relative values against `now`
    pub fn time_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, CodecError> {
        if let Ok(duration) = parse_duration(&self.0) {
            return now
                .checked_add_signed(duration)
                .ok_or_else(|| CodecError::OutOfRange(self.0.clone()));
        }
        parse_time(&self.0)
    }

    pub fn time(&self) -> Result<DateTime<Utc>, CodecError> {
        self.time_at(Utc::now())
    }
}

fn parse_time(text: &str) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|time| time.with_timezone(&Utc))
        .map_err(|_| CodecError::InvalidTime(text.to_string()))
}

/// Start/end pair of a time period
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<AbsoluteOrRelativeTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<AbsoluteOrRelativeTime>,
}

impl TimePeriod {
    pub fn relative(start: Duration, end: Option<Duration>) -> Self {
        Self {
            start_time: Some(AbsoluteOrRelativeTime::from_duration(start)),
            end_time: end.map(AbsoluteOrRelativeTime::from_duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_scaled_number_value() {
        assert_eq!(ScaledNumber::new(74690, 0).value(), 74690.0);
        assert_eq!(ScaledNumber::new(3, -1).value(), 0.3);
        assert_eq!(ScaledNumber::new(16, 3).value(), 16000.0);
        assert_eq!(ScaledNumber { number: 5, scale: None }.value(), 5.0);
    }

    #[test]
    fn test_scaled_number_from_f64() {
        assert_eq!(ScaledNumber::from_f64(0.3), ScaledNumber::new(3, -1));
        assert_eq!(ScaledNumber::from_f64(11000.0), ScaledNumber::new(11000, 0));
        assert_eq!(ScaledNumber::from_f64(0.1234567).scale, Some(-4));
        assert_eq!(ScaledNumber::from_f64(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_parse_durations() {
        let cases = [
            ("PT0S", 0),
            ("PT2H", 7_200),
            ("P1DT2H30M", 95_400),
            ("P7D", 604_800),
            ("P1W", 604_800),
            ("-PT30M", -1_800),
            ("PT1.5S", 1),
        ];

        for (text, seconds) in cases {
            let parsed = DurationType::new(text).duration().unwrap();
            assert_eq!(parsed.num_seconds(), seconds, "{}", text);
        }

        let fractional = DurationType::new("PT1.5S").duration().unwrap();
        assert_eq!(fractional.num_milliseconds(), 1_500);
    }

    #[test]
    fn test_reject_malformed_durations() {
        for text in ["", "P", "PT", "2H", "PT2X", "P1H", "PT-2H", "PT2H junk"] {
            assert!(
                DurationType::new(text).duration().is_err(),
                "{} should not parse",
                text
            );
        }
    }

    #[test]
    fn test_render_durations() {
        assert_eq!(DurationType::from_duration(Duration::ZERO).0, "PT0S");
        assert_eq!(DurationType::from_duration(Duration::from_secs(7_200)).0, "PT2H");
        assert_eq!(
            DurationType::from_duration(Duration::from_secs(7 * 24 * 3_600)).0,
            "P7D"
        );
        assert_eq!(
            DurationType::from_duration(Duration::from_millis(90_500)).0,
            "PT1M30.5S"
        );
        assert_eq!(
            DurationType::from_signed(ChronoDuration::minutes(-90)).0,
            "-PT1H30M"
        );
    }

    #[test]
    fn test_negative_duration_is_not_std() {
        assert!(DurationType::new("-PT1H").std_duration().is_err());
        assert_eq!(
            DurationType::new("PT1H").std_duration().unwrap(),
            Duration::from_secs(3_600)
        );
    }

    #[test]
    fn test_relative_and_absolute_times() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let relative = AbsoluteOrRelativeTime::new("PT1H");
        assert!(relative.is_relative());
        assert_eq!(relative.time_at(now).unwrap(), now + ChronoDuration::hours(1));
        assert_eq!(relative.duration_at(now).unwrap(), ChronoDuration::hours(1));

        let absolute = AbsoluteOrRelativeTime::new("2024-05-01T14:00:00Z");
        assert!(!absolute.is_relative());
        assert_eq!(absolute.time_at(now).unwrap(), now + ChronoDuration::hours(2));
        assert_eq!(absolute.duration_at(now).unwrap(), ChronoDuration::hours(2));

        assert!(AbsoluteOrRelativeTime::new("tomorrow").time_at(now).is_err());
    }

    #[test]
    fn test_time_period_serialization() {
        let period = TimePeriod::relative(Duration::ZERO, Some(Duration::from_secs(3_600)));
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, r#"{"startTime":"PT0S","endTime":"PT1H"}"#);
    }

    proptest! {
        /// Rendered durations decode to the same whole-millisecond span
        #[test]
        fn rendered_duration_decodes_to_same_span(millis in 0u64..10_000_000_000u64) {
            let duration = Duration::from_millis(millis);
            let decoded = DurationType::from_duration(duration).std_duration().unwrap();
            prop_assert_eq!(decoded, duration);
        }

        /// Values with at most four decimals survive scaled encoding
        #[test]
        fn four_decimal_values_are_exact(mantissa in -10_000_000i64..10_000_000i64) {
            let value = mantissa as f64 / 10_000.0;
            let decoded = ScaledNumber::from_f64(value).value();
            prop_assert!((decoded - value).abs() < 1e-9, "{} != {}", decoded, value);
        }
    }
}
