//! Calendar helpers for month-granular upstream requests.

use chrono::{Datelike, NaiveDate};

/// First day of every month touched by `[start, end]`, in order.
///
/// Empty when `start` falls in a later month than `end`.
pub fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let Some(mut cur) = first_of_month(start) else {
        return months;
    };
    let Some(last) = first_of_month(end) else {
        return months;
    };
    while cur <= last {
        months.push(cur);
        cur = match next_month(cur) {
            Some(next) => next,
            None => break,
        };
    }
    months
}

pub fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)
}

fn next_month(first: NaiveDate) -> Option<NaiveDate> {
    if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn single_month() {
        assert_eq!(month_starts(d(2024, 5, 3), d(2024, 5, 20)), vec![d(2024, 5, 1)]);
    }

    #[test]
    fn crosses_year_boundary() {
        assert_eq!(
            month_starts(d(2023, 11, 30), d(2024, 2, 1)),
            vec![d(2023, 11, 1), d(2023, 12, 1), d(2024, 1, 1), d(2024, 2, 1)]
        );
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(month_starts(d(2024, 6, 1), d(2024, 5, 31)).is_empty());
    }

    #[test]
    fn same_month_reversed_days_still_one_month() {
        // Partitioning only looks at months; trimming happens after the fetch.
        assert_eq!(month_starts(d(2024, 6, 20), d(2024, 6, 2)), vec![d(2024, 6, 1)]);
    }
}
