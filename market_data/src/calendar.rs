//! Business-day ("B" frequency) calendar: Monday through Friday, no holiday list.
//!
//! Exchange holidays are not modelled; they show up as gaps in the history and
//! are forward-filled where a model needs a regular index.

use chrono::{Datelike, NaiveDate, Weekday};

/// Whether `date` falls Monday–Friday.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The first business day strictly after `date`, or `None` past the end of
/// the representable calendar.
pub fn next_business_day(date: NaiveDate) -> Option<NaiveDate> {
    let mut d = date.succ_opt()?;
    while !is_business_day(d) {
        d = d.succ_opt()?;
    }
    Some(d)
}

/// The `n` consecutive business days strictly after `last`.
///
/// `last` itself may be any day of the week; a Saturday `last` yields the
/// following Monday first.
pub fn business_days_after(last: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut cursor = last;
    while out.len() < n {
        match next_business_day(cursor) {
            Some(d) => {
                out.push(d);
                cursor = d;
            }
            None => break,
        }
    }
    out
}

/// Every business day in `start..=end`, ascending.
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut d = start;
    while d <= end {
        if is_business_day(d) {
            out.push(d);
        }
        match d.succ_opt() {
            Some(n) => d = n,
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn friday_rolls_to_monday() {
        assert_eq!(next_business_day(d(2024, 5, 31)), Some(d(2024, 6, 3)));
        assert_eq!(
            business_days_after(d(2024, 5, 31), 3),
            vec![d(2024, 6, 3), d(2024, 6, 4), d(2024, 6, 5)]
        );
    }

    #[test]
    fn weekend_anchor_starts_on_monday() {
        assert_eq!(business_days_after(d(2024, 6, 1), 1), vec![d(2024, 6, 3)]);
    }

    #[test]
    fn between_skips_weekends() {
        let days = business_days_between(d(2024, 6, 7), d(2024, 6, 10));
        assert_eq!(days, vec![d(2024, 6, 7), d(2024, 6, 10)]);
    }

    proptest! {
        #[test]
        fn after_is_strictly_increasing_weekdays(offset in 0i64..3000, n in 0usize..400) {
            let start = d(2015, 1, 1) + chrono::Duration::days(offset);
            let days = business_days_after(start, n);
            prop_assert_eq!(days.len(), n);
            prop_assert!(days.iter().all(|x| is_business_day(*x) && *x > start));
            prop_assert!(days.windows(2).all(|w| w[0] < w[1]));
            // contiguous: no business day skipped between neighbours
            for w in days.windows(2) {
                prop_assert_eq!(next_business_day(w[0]), Some(w[1]));
            }
        }
    }
}
