use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Regular US session, 09:30-16:00 New York, approximated in UTC without
/// daylight-saving adjustment. Minutes after midnight.
const OPEN_MIN: u32 = 13 * 60 + 30;
const CLOSE_MIN: u32 = 20 * 60;

/// Whether `at` falls inside regular trading hours on a weekday. Exchange
/// holidays are not modelled.
pub fn is_market_open(at: DateTime<Utc>) -> bool {
    if matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let minute = at.hour() * 60 + at.minute();
    (OPEN_MIN..CLOSE_MIN).contains(&minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        // March 2025: the 14th is a Friday.
        Utc.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
    }

    #[test]
    fn weekday_session_bounds() {
        assert!(!is_market_open(at(14, 13, 29)));
        assert!(is_market_open(at(14, 13, 30)));
        assert!(is_market_open(at(14, 19, 59)));
        assert!(!is_market_open(at(14, 20, 0)));
    }

    #[test]
    fn weekends_are_closed() {
        assert!(!is_market_open(at(15, 15, 0)));
        assert!(!is_market_open(at(16, 15, 0)));
        assert!(is_market_open(at(17, 15, 0)));
    }
}
