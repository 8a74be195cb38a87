//! Banking day arithmetic
//!
//! ACH effective entry dates must land on a Federal Reserve banking day:
//! not a Saturday, Sunday or Fed holiday. Fixed-date holidays falling on a
//! Sunday are observed the following Monday; Saturday holidays are not moved.

use chrono::{Datelike, NaiveDate, Weekday};

/// True if the Federal Reserve settles ACH on this date.
pub fn is_banking_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_holiday(date)
}

/// Move forward `days` banking days. Zero returns the next banking day on
/// or after `date`.
pub fn add_banking_days(date: NaiveDate, days: u32) -> NaiveDate {
    let mut current = date;
    while !is_banking_day(current) {
        current = current.succ_opt().unwrap_or(current);
    }
    for _ in 0..days {
        current = current.succ_opt().unwrap_or(current);
        while !is_banking_day(current) {
            current = current.succ_opt().unwrap_or(current);
        }
    }
    current
}

fn is_holiday(date: NaiveDate) -> bool {
    let year = date.year();
    let observed = |month: u32, day: u32| -> Option<NaiveDate> {
        let d = NaiveDate::from_ymd_opt(year, month, day)?;
        match d.weekday() {
            Weekday::Sun => d.succ_opt(),
            _ => Some(d),
        }
    };

    let fixed = [
        observed(1, 1),   // New Year's Day
        observed(6, 19),  // Juneteenth
        observed(7, 4),   // Independence Day
        observed(11, 11), // Veterans Day
        observed(12, 25), // Christmas Day
    ];
    if fixed.iter().flatten().any(|d| *d == date) {
        return true;
    }

    let floating = [
        NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3), // MLK
        NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3), // Presidents
        last_weekday_of_month(year, 5, Weekday::Mon),                  // Memorial
        NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1), // Labor
        NaiveDate::from_weekday_of_month_opt(year, 10, Weekday::Mon, 2), // Columbus
        NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4), // Thanksgiving
    ];
    floating.iter().flatten().any(|d| *d == date)
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, 5)
        .or_else(|| NaiveDate::from_weekday_of_month_opt(year, month, weekday, 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekday_next_day() {
        // Tuesday -> Wednesday
        assert_eq!(add_banking_days(ymd(2024, 3, 12), 1), ymd(2024, 3, 13));
    }

    #[test]
    fn test_friday_skips_weekend() {
        assert_eq!(add_banking_days(ymd(2024, 3, 15), 1), ymd(2024, 3, 18));
    }

    #[test]
    fn test_weekend_start() {
        // Saturday -> Monday is the first banking day, one more is Tuesday
        assert_eq!(add_banking_days(ymd(2024, 3, 16), 1), ymd(2024, 3, 19));
        assert_eq!(add_banking_days(ymd(2024, 3, 16), 0), ymd(2024, 3, 18));
    }

    #[test]
    fn test_holidays() {
        assert!(!is_banking_day(ymd(2024, 7, 4)));
        assert!(!is_banking_day(ymd(2024, 11, 28))); // Thanksgiving
        assert!(!is_banking_day(ymd(2024, 5, 27))); // Memorial Day
        assert!(!is_banking_day(ymd(2024, 1, 15))); // MLK
        // Christmas 2022 was a Sunday, observed Monday
        assert!(!is_banking_day(ymd(2022, 12, 26)));
        // Day before Independence Day is a normal day
        assert!(is_banking_day(ymd(2024, 7, 3)));
        assert_eq!(add_banking_days(ymd(2024, 7, 3), 1), ymd(2024, 7, 5));
    }
}
