use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::mem::replace;
use std::ops::RangeInclusive;

/// An inclusive calendar date range.
#[derive(Clone, Eq, PartialEq, Copy, Debug, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(DateRange { start, end })
    }

    /// Jan 1 of `first` through Dec 31 of `last`.
    pub fn years(first: i32, last: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(first, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(last, 12, 31)?;
        DateRange::new(start, end)
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        *date >= self.start && *date <= self.end
    }

    pub fn calendar_years(&self) -> RangeInclusive<i32> {
        self.start.year()..=self.end.year()
    }

    /// Iterate each day from start through end.
    pub fn days(&self) -> Days {
        Days(Some(self.start), self.end)
    }
}

/// Iterator over the days of a [`DateRange`].
#[derive(Clone, Debug)]
pub struct Days(Option<NaiveDate>, NaiveDate);

impl Iterator for Days {
    type Item = NaiveDate;
    fn next(&mut self) -> Option<Self::Item> {
        match self.0 {
            Some(current) if current <= self.1 => replace(&mut self.0, current.succ_opt()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DateRange;
    use chrono::NaiveDate;

    #[test]
    fn test_date_range_iteration() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2022, 1, 5).unwrap();
        let range = DateRange::new(start, end).unwrap();
        let dates: Vec<NaiveDate> = range.days().collect();
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], start);
        assert_eq!(dates[4], end);
    }

    #[test]
    fn test_date_range_single_day() {
        let start = NaiveDate::from_ymd_opt(2022, 3, 15).unwrap();
        let range = DateRange::new(start, start).unwrap();
        assert_eq!(range.days().count(), 1);
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let start = NaiveDate::from_ymd_opt(2022, 3, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2022, 3, 14).unwrap();
        assert!(DateRange::new(start, end).is_none());
    }

    #[test]
    fn test_years_and_contains() {
        let range = DateRange::years(2020, 2024).unwrap();
        assert_eq!(range.calendar_years().count(), 5);
        assert!(range.contains(&NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
        assert!(!range.contains(&NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn test_serializes_start_end() {
        let range = DateRange::years(2001, 2001).unwrap();
        let json = serde_json::to_value(range).unwrap();
        assert_eq!(json["start"], "2001-01-01");
        assert_eq!(json["end"], "2001-12-31");
    }
}
