// External crates
use chrono::{DateTime, NaiveDateTime, Utc};

/// Format accepted by `--from` / `--to`.
pub const ABSOLUTE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("time interval is empty")]
    Empty,
    #[error("invalid time interval {0:?}, expected e.g. 5m, 2h30m or 1w2d")]
    Malformed(String),
    #[error("time interval {0:?} is too large")]
    Overflow(String),
}

/// Parse a human readable interval such as `90`, `5m`, `2h30m` or `1w2d3h4m5s`
/// into seconds.
///
/// Units are `w`, `d`, `h`, `m` and `s`, case-insensitive, each at most once
/// and in that order. A trailing number without unit counts as seconds.
pub fn parse_interval(value: &str) -> Result<u64, IntervalError> {
    const UNITS: [(char, u64); 5] = [
        ('w', 7 * 24 * 3600),
        ('d', 24 * 3600),
        ('h', 3600),
        ('m', 60),
        ('s', 1),
    ];

    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return Err(IntervalError::Empty);
    }

    let malformed = || IntervalError::Malformed(value.clone());
    let overflow = || IntervalError::Overflow(value.clone());

    let mut total: u64 = 0;
    let mut digits = String::new();
    // Index into UNITS of the next unit allowed; enforces order and uniqueness.
    let mut next_unit = 0;

    for ch in value.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let offset = UNITS[next_unit..]
            .iter()
            .position(|(unit, _)| *unit == ch)
            .ok_or_else(malformed)?;
        if digits.is_empty() {
            return Err(malformed());
        }

        let (_, multiplier) = UNITS[next_unit + offset];
        let amount: u64 = digits.parse().map_err(|_| overflow())?;
        total = amount
            .checked_mul(multiplier)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(overflow)?;

        digits.clear();
        next_unit += offset + 1;
    }

    if !digits.is_empty() {
        if next_unit >= UNITS.len() {
            return Err(malformed());
        }
        let amount: u64 = digits.parse().map_err(|_| overflow())?;
        total = total.checked_add(amount).ok_or_else(overflow)?;
    }

    Ok(total)
}

/// Parse a `--from` / `--to` value (`YYYY-MM-DD HH:MM:SS`, UTC).
pub fn parse_absolute_date(value: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(value.trim(), ABSOLUTE_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid date {value:?} ({e}), expected format yyyy-MM-dd HH:mm:ss"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_interval("5m"), Ok(300));
        assert_eq!(parse_interval("2h"), Ok(7200));
        assert_eq!(parse_interval("1d"), Ok(86_400));
        assert_eq!(parse_interval("1w"), Ok(604_800));
        assert_eq!(parse_interval("45s"), Ok(45));
        assert_eq!(parse_interval("45"), Ok(45));
    }

    #[test]
    fn parses_compound_intervals() {
        assert_eq!(parse_interval("1w2d3h4m5s"), Ok(604_800 + 172_800 + 10_800 + 240 + 5));
        assert_eq!(parse_interval("2h30m"), Ok(9000));
        assert_eq!(parse_interval("1m30"), Ok(90));
        assert_eq!(parse_interval("1H5M"), Ok(3900));
    }

    #[test]
    fn rejects_malformed_intervals() {
        assert_eq!(parse_interval(""), Err(IntervalError::Empty));
        assert!(matches!(parse_interval("m"), Err(IntervalError::Malformed(_))));
        assert!(matches!(parse_interval("5x"), Err(IntervalError::Malformed(_))));
        assert!(matches!(parse_interval("5m2h"), Err(IntervalError::Malformed(_))));
        assert!(matches!(parse_interval("5m5m"), Err(IntervalError::Malformed(_))));
        assert!(matches!(parse_interval("5s3"), Err(IntervalError::Malformed(_))));
    }

    #[test]
    fn rejects_overflowing_intervals() {
        assert!(matches!(
            parse_interval("99999999999999999999w"),
            Err(IntervalError::Overflow(_))
        ));
    }

    #[test]
    fn parses_absolute_dates_as_utc() {
        assert_eq!(
            parse_absolute_date("2024-05-01 08:15:00"),
            Ok(Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 0).unwrap())
        );
        assert!(parse_absolute_date("2024-05-01T08:15:00").is_err());
        assert!(parse_absolute_date("01/05/2024").is_err());
    }
}
