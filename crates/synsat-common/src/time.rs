//! Time handling utilities for model output.
//!
//! Two encodings show up in the source files:
//!
//! - CF conventions: `"<unit> since <reference>"` with a numeric offset
//! - packed: `YYYYMMDD.fraction`, where the fraction is the elapsed part of the day

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::error::{CommonError, CommonResult};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Round a timestamp to the nearest multiple of `round_to_secs` within its day.
///
/// Sub-second parts are dropped.
pub fn round_time(dt: DateTime<Utc>, round_to_secs: f64) -> DateTime<Utc> {
    let seconds = dt.num_seconds_from_midnight() as f64;
    let rounding = ((seconds + round_to_secs / 2.0) / round_to_secs).floor() * round_to_secs;

    dt + Duration::seconds((rounding - seconds) as i64)
        - Duration::nanoseconds(dt.nanosecond() as i64)
}

/// Round a timestamp to the nearest midnight.
pub fn round_to_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    let shifted = dt + Duration::hours(12);
    Utc.from_utc_datetime(&shifted.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Decode a packed `YYYYMMDD.fraction` value, rounded to `round_to_secs`.
pub fn packed_to_datetime(t: f64, round_to_secs: f64) -> CommonResult<DateTime<Utc>> {
    if !t.is_finite() || t < 0.0 {
        return Err(CommonError::InvalidTime(format!("packed time {}", t)));
    }

    let date_part = t.trunc() as u32;
    let frac = t - t.trunc();

    let date = NaiveDate::from_ymd_opt(
        (date_part / 10_000) as i32,
        (date_part / 100) % 100,
        date_part % 100,
    )
    .ok_or_else(|| CommonError::InvalidTime(format!("packed date {}", date_part)))?;

    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default());
    let offset = Duration::microseconds((frac * SECONDS_PER_DAY * 1e6).round() as i64);

    Ok(round_time(midnight + offset, round_to_secs))
}

/// Encode a timestamp in the packed `YYYYMMDD.fraction` format.
pub fn datetime_to_packed(dt: &DateTime<Utc>) -> f64 {
    let date_part = dt.year() as f64 * 10_000.0 + dt.month() as f64 * 100.0 + dt.day() as f64;
    let elapsed =
        dt.num_seconds_from_midnight() as f64 + dt.nanosecond() as f64 * 1e-9;

    date_part + elapsed / SECONDS_PER_DAY
}

/// Calendar decomposition: year, month, day, hour, minute, second, microsecond.
pub fn calendar_vector(dt: &DateTime<Utc>) -> [u32; 7] {
    [
        dt.year() as u32,
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.nanosecond() / 1_000,
    ]
}

/// Decode CF-style offsets, e.g. `"hours since 1900-01-01 00:00:00"`.
pub fn decode_cf_time(values: &[f64], units: &str) -> CommonResult<Vec<DateTime<Utc>>> {
    let (unit, reference) = units
        .split_once(" since ")
        .ok_or_else(|| CommonError::InvalidTime(format!("not a CF time unit: {}", units)))?;

    let seconds_per_unit = match unit.trim().to_lowercase().as_str() {
        "seconds" | "second" | "secs" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "h" => 3_600.0,
        "days" | "day" | "d" => SECONDS_PER_DAY,
        other => {
            return Err(CommonError::InvalidTime(format!("unsupported time unit '{}'", other)))
        }
    };

    let reference = parse_reference_time(reference.trim())?;

    Ok(values
        .iter()
        .map(|v| reference + Duration::microseconds((v * seconds_per_unit * 1e6).round() as i64))
        .collect())
}

/// Decode a time coordinate, choosing CF or packed format from its units.
///
/// Values without a `since` clause are treated as packed timestamps.
pub fn decode_time_values(
    values: &[f64],
    units: Option<&str>,
    round_to_secs: f64,
) -> CommonResult<Vec<DateTime<Utc>>> {
    match units {
        Some(u) if u.contains(" since ") => decode_cf_time(values, u),
        _ => values
            .iter()
            .map(|&t| packed_to_datetime(t, round_to_secs))
            .collect(),
    }
}

/// Seconds since the Unix epoch, the encoding used for written results.
pub fn to_epoch_seconds(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + dt.timestamp_subsec_micros() as f64 * 1e-6
}

/// Parse a user-supplied timestamp such as `2021-07-01T0030` or `2021-07-01T00:30:00Z`.
pub fn parse_timestamp(s: &str) -> CommonResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_reference_time(s)
}

fn parse_reference_time(s: &str) -> CommonResult<DateTime<Utc>> {
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H%M",
        "%Y-%m-%dT%H%M%S",
    ];

    let trimmed = s.trim_end_matches('Z').trim_end_matches(" UTC");
    for fmt in FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }

    Err(CommonError::InvalidTime(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_packed_noon() {
        let dt = packed_to_datetime(20200912.5, 60.0).unwrap();
        assert_eq!(dt, utc(2020, 9, 12, 12, 0, 0));
    }

    #[test]
    fn test_packed_rounds_to_minute() {
        // 00:15:00 plus ~0.9 s of float noise
        let t = 20200912.0 + (900.9 / 86_400.0);
        let dt = packed_to_datetime(t, 60.0).unwrap();
        assert_eq!(dt, utc(2020, 9, 12, 0, 15, 0));
    }

    #[test]
    fn test_packed_roundtrip() {
        let dt = utc(2021, 7, 1, 0, 30, 0);
        let packed = datetime_to_packed(&dt);
        assert_eq!(packed_to_datetime(packed, 60.0).unwrap(), dt);
    }

    #[test]
    fn test_packed_invalid_date() {
        assert!(packed_to_datetime(20201341.0, 60.0).is_err());
        assert!(packed_to_datetime(f64::NAN, 60.0).is_err());
    }

    #[test]
    fn test_round_time() {
        let dt = utc(2020, 9, 12, 10, 14, 31);
        assert_eq!(round_time(dt, 60.0), utc(2020, 9, 12, 10, 15, 0));
        assert_eq!(round_time(dt, 3600.0), utc(2020, 9, 12, 10, 0, 0));
    }

    #[test]
    fn test_round_to_day() {
        assert_eq!(round_to_day(utc(2020, 9, 12, 13, 0, 0)), utc(2020, 9, 13, 0, 0, 0));
        assert_eq!(round_to_day(utc(2020, 9, 12, 11, 59, 0)), utc(2020, 9, 12, 0, 0, 0));
    }

    #[test]
    fn test_calendar_vector() {
        let cal = calendar_vector(&utc(2020, 9, 15, 6, 45, 10));
        assert_eq!(cal, [2020, 9, 15, 6, 45, 10, 0]);
    }

    #[test]
    fn test_decode_cf_hours() {
        let times = decode_cf_time(&[0.0, 6.0], "hours since 2020-09-15 00:00:00").unwrap();
        assert_eq!(times, vec![utc(2020, 9, 15, 0, 0, 0), utc(2020, 9, 15, 6, 0, 0)]);
    }

    #[test]
    fn test_decode_time_values_dispatch() {
        let packed = decode_time_values(&[20200912.25], Some("day as %Y%m%d.%f"), 60.0).unwrap();
        assert_eq!(packed[0], utc(2020, 9, 12, 6, 0, 0));

        let cf = decode_time_values(&[1.0], Some("days since 2020-01-01"), 60.0).unwrap();
        assert_eq!(cf[0], utc(2020, 1, 2, 0, 0, 0));
    }

    #[test]
    fn test_decode_cf_rejects_unknown_unit() {
        assert!(decode_cf_time(&[1.0], "fortnights since 2020-01-01").is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2021-07-01T0030").unwrap(), utc(2021, 7, 1, 0, 30, 0));
        assert_eq!(
            parse_timestamp("2021-07-01T00:30:00Z").unwrap(),
            utc(2021, 7, 1, 0, 30, 0)
        );
        assert!(parse_timestamp("yesterday").is_err());
    }
}
