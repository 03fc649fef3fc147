//! # Observation dates
//!
//! `DATE-OBS` values are turned into hifitime [`Epoch`]s (UTC) and compared or
//! interpolated as modified julian dates.

use hifitime::Epoch;

use crate::{constants::MJD, makewcs_errors::MakeWcsError};

/// Parse the value of a `DATE-OBS` keyword.
///
/// Accepted layouts
/// ----------------
/// * `YYYY-MM-DD`
/// * `YYYY-MM-DDTHH:MM:SS[.fff]`
/// * `DD/MM/YY`, the two-digit-year layout of older headers (years 1950–2049)
///
/// Argument
/// --------
/// * `date`: the keyword value, surrounding blanks allowed
///
/// Return
/// ------
/// * the UTC [`Epoch`], or [`MakeWcsError::InvalidDate`]
pub fn parse_date_obs(date: &str) -> Result<Epoch, MakeWcsError> {
    let date = date.trim();
    let invalid = || MakeWcsError::InvalidDate(date.to_string());

    let (year, month, day, time) = if date.contains('/') {
        let parts: Vec<&str> = date.split('/').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let day: u8 = parts[0].trim().parse().map_err(|_| invalid())?;
        let month: u8 = parts[1].trim().parse().map_err(|_| invalid())?;
        let yy: i32 = parts[2].trim().parse().map_err(|_| invalid())?;
        let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
        (year, month, day, None)
    } else {
        let (day_part, time_part) = match date.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (date, None),
        };
        let parts: Vec<&str> = day_part.split('-').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let year: i32 = parts[0].parse().map_err(|_| invalid())?;
        let month: u8 = parts[1].parse().map_err(|_| invalid())?;
        let day: u8 = parts[2].parse().map_err(|_| invalid())?;
        (year, month, day, time_part)
    };

    let (hour, minute, second, nanos) = match time {
        Some(t) => parse_time_of_day(t).ok_or_else(invalid)?,
        None => (0, 0, 0, 0),
    };

    Epoch::maybe_from_gregorian_utc(year, month, day, hour, minute, second, nanos)
        .map_err(|_| invalid())
}

/// `HH:MM:SS[.fff]` → (hour, minute, second, nanoseconds)
fn parse_time_of_day(time: &str) -> Option<(u8, u8, u8, u32)> {
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hour: u8 = parts[0].parse().ok()?;
    let minute: u8 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    if hour > 23 || minute > 59 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    Some((hour, minute, whole as u8, nanos))
}

/// Modified julian date (UTC) of an epoch.
pub fn epoch_to_mjd(epoch: &Epoch) -> MJD {
    epoch.to_mjd_utc_days()
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_date_only() {
        let epoch = parse_date_obs("2021-01-01").unwrap();
        assert_eq!(epoch_to_mjd(&epoch), 59215.0);

        let epoch = parse_date_obs(" 2021-01-02 ").unwrap();
        assert_eq!(epoch_to_mjd(&epoch), 59216.0);
    }

    #[test]
    fn test_parse_timestamp() {
        let epoch = parse_date_obs("2021-01-01T12:00:00").unwrap();
        assert_relative_eq!(epoch_to_mjd(&epoch), 59215.5, epsilon = 1e-9);

        let epoch = parse_date_obs("2021-01-01T06:00:00.000").unwrap();
        assert_relative_eq!(epoch_to_mjd(&epoch), 59215.25, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_legacy_layout() {
        let epoch = parse_date_obs("20/05/94").unwrap();
        assert_eq!(epoch, parse_date_obs("1994-05-20").unwrap());

        let epoch = parse_date_obs("01/01/21").unwrap();
        assert_eq!(epoch_to_mjd(&epoch), 59215.0);
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(
            parse_date_obs("2021-13-01"),
            Err(MakeWcsError::InvalidDate("2021-13-01".into()))
        );
        assert!(parse_date_obs("yesterday").is_err());
        assert!(parse_date_obs("2021-01-01T25:00:00").is_err());
        assert!(parse_date_obs("1/2").is_err());
        assert!(parse_date_obs("2021-01-00").is_err());
    }

    #[test]
    fn test_impossible_calendar_dates() {
        assert_eq!(
            parse_date_obs("2021-02-30"),
            Err(MakeWcsError::InvalidDate("2021-02-30".into()))
        );
        assert!(parse_date_obs("2021-04-31T00:00:00").is_err());
        assert!(parse_date_obs("29/02/21").is_err());
        assert!(parse_date_obs("2020-02-29").is_ok());
    }
}
