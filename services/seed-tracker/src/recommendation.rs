//! Recommendation window predicate.
//!
//! A batch is recommended for processing once its sell-by date falls within
//! `window_days` of today. Every caller that needs the flag (listing, detail,
//! exports, seed tag) goes through [`is_recommended`].

use chrono::{Days, Local, NaiveDate};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// `sell_by_date <= today + window_days`, inclusive on the boundary.
pub fn is_recommended(sell_by_date: NaiveDate, today: NaiveDate, window_days: u32) -> bool {
    match today.checked_add_days(Days::new(u64::from(window_days))) {
        Some(cutoff) => sell_by_date <= cutoff,
        // past the end of the calendar: nothing can be later than the cutoff
        None => true,
    }
}

/// Server-local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let today = date(2026, 10, 18);
        assert!(is_recommended(date(2026, 11, 17), today, 30));
        assert!(!is_recommended(date(2026, 11, 18), today, 30));
    }

    #[test]
    fn test_past_dates_are_recommended() {
        let today = date(2026, 10, 18);
        assert!(is_recommended(date(2025, 1, 1), today, 30));
        assert!(is_recommended(today, today, 0));
        assert!(!is_recommended(date(2026, 10, 19), today, 0));
    }

    #[test]
    fn test_window_crosses_year_end() {
        let today = date(2026, 12, 20);
        assert!(is_recommended(date(2027, 1, 19), today, 30));
        assert!(!is_recommended(date(2027, 1, 20), today, 30));
    }

    #[test]
    fn test_overflowing_window_recommends_everything() {
        assert!(is_recommended(NaiveDate::MAX, NaiveDate::MAX, 1));
    }
}
