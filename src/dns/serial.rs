use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

/// `YYYYMMDDHH` for the given instant, as an integer.
pub fn serial_at<Tz: TimeZone>(now: &DateTime<Tz>) -> u64 {
    let year = now.year().max(0) as u64;
    year * 1_000_000 + now.month() as u64 * 10_000 + now.day() as u64 * 100 + now.hour() as u64
}

pub fn current_serial() -> u64 {
    serial_at(&Local::now())
}

/// Jump forward to the clock when it is ahead, otherwise keep the current
/// serial. Never decreases; edits within the same hour share a serial.
pub fn next_serial(current: u64, today: u64) -> u64 {
    if today > current {
        today
    } else {
        current
    }
}

/// Serial bump from a textual serial. Anything non-numeric restarts at the clock.
pub fn increment_serial(current: &str) -> u64 {
    let today = current_serial();
    match current.trim().parse::<u64>() {
        Ok(current) => next_serial(current, today),
        Err(_) => today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_serial_format() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 7, 59, 0).unwrap();
        assert_eq!(serial_at(&at), 2024010507);
        let at = Utc.with_ymd_and_hms(2099, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(serial_at(&at), 2099123123);
    }

    #[test]
    fn test_next_serial_jumps_forward() {
        assert_eq!(next_serial(2024010100, 2024060112), 2024060112);
    }

    #[test]
    fn test_next_serial_same_hour_is_unchanged() {
        assert_eq!(next_serial(2024060112, 2024060112), 2024060112);
    }

    #[test]
    fn test_next_serial_never_decreases() {
        for current in [0u64, 1, 2024010100, 2024060112, 2024060113, 9_999_999_999] {
            for today in [2024010100u64, 2024060112, 2030010100] {
                let next = next_serial(current, today);
                assert!(next >= current);
                if today > current {
                    assert_eq!(next, today);
                }
            }
        }
    }

    #[test]
    fn test_increment_serial_text() {
        let today = current_serial();
        assert!(increment_serial("2000010100") >= today);
        assert_eq!(increment_serial("9999999999"), 9999999999);
        assert!(increment_serial("not-a-serial") >= today);
    }
}
