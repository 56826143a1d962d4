//! Shared utility functions for snow tracker crates.

/// Date utility functions
pub mod dates {
    use chrono::{Datelike, NaiveDate};
    use serde::{Deserialize, Serialize};

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
    }

    /// Parse a date string in "YYYYMMDD" format (compact format)
    pub fn parse_date_compact(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, "%Y%m%d")?)
    }

    /// Parse any of the date shapes returned by the remote services.
    ///
    /// Accepts "YYYY-MM-DD", "YYYYMMDD", "YYYY-MM-DD HH:MM" and the monthly
    /// "YYYY-MM" form, which maps to the first day of that month.
    pub fn parse_date_lenient(s: &str) -> anyhow::Result<NaiveDate> {
        let trimmed = s.trim();
        let head = trimmed.split_whitespace().next().unwrap_or("");
        if let Ok(d) = parse_date(head) {
            return Ok(d);
        }
        if let Ok(d) = parse_date_compact(head) {
            return Ok(d);
        }
        match NaiveDate::parse_from_str(&format!("{head}-01"), "%Y-%m-%d") {
            Ok(d) => Ok(d),
            Err(_) => anyhow::bail!("unrecognised date '{}'", trimmed),
        }
    }

    /// Zero-based day of the calendar year (Jan 1 = day 0).
    pub fn day_of_year(date: &NaiveDate) -> u32 {
        date.ordinal0()
    }

    /// First day of a calendar year.
    pub fn year_start(year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, 1, 1)
    }

    /// Last day of a calendar year.
    pub fn year_end(year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, 12, 31)
    }

    /// A recurring window inside which a snow season is searched for.
    ///
    /// The window starts on `start_month/start_day` of the season year and
    /// ends (exclusive) on `end_month/end_day`, in the following calendar
    /// year when the end month/day comes before the start.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SeasonWindow {
        pub start_month: u32,
        pub start_day: u32,
        pub end_month: u32,
        pub end_day: u32,
    }

    impl Default for SeasonWindow {
        /// Sept 1 through Mar 1.
        fn default() -> Self {
            Self {
                start_month: 9,
                start_day: 1,
                end_month: 3,
                end_day: 1,
            }
        }
    }

    impl SeasonWindow {
        fn wraps_year(&self) -> bool {
            (self.end_month, self.end_day) <= (self.start_month, self.start_day)
        }

        /// Start (inclusive) and end (exclusive) dates of the window that
        /// opens in `season_year`.
        pub fn bounds(&self, season_year: i32) -> Option<(NaiveDate, NaiveDate)> {
            let start = NaiveDate::from_ymd_opt(season_year, self.start_month, self.start_day)?;
            let end_year = if self.wraps_year() {
                season_year + 1
            } else {
                season_year
            };
            let end = NaiveDate::from_ymd_opt(end_year, self.end_month, self.end_day)?;
            Some((start, end))
        }

        /// The season year whose window contains `date`, if any.
        pub fn season_year_for(&self, date: &NaiveDate) -> Option<i32> {
            [date.year(), date.year() - 1].into_iter().find(|year| {
                self.bounds(*year)
                    .map(|(start, end)| *date >= start && *date < end)
                    .unwrap_or(false)
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;

        #[test]
        fn test_format_and_parse() {
            let date = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
            let formatted = format_date(&date);
            assert_eq!(formatted, "2023-06-15");
            let parsed = parse_date(&formatted).unwrap();
            assert_eq!(parsed, date);
        }

        #[test]
        fn test_parse_date_lenient() {
            let jan15 = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
            assert_eq!(parse_date_lenient("2024-01-15").unwrap(), jan15);
            assert_eq!(parse_date_lenient("20240115").unwrap(), jan15);
            assert_eq!(parse_date_lenient("2024-01-15 00:00").unwrap(), jan15);
            assert_eq!(
                parse_date_lenient("2024-01").unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
            );
            assert!(parse_date_lenient("Jan 15").is_err());
        }

        #[test]
        fn test_day_of_year() {
            let jan1 = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
            assert_eq!(day_of_year(&jan1), 0);
            let dec31 = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
            assert_eq!(day_of_year(&dec31), 365);
        }

        #[test]
        fn test_default_season_window_bounds() {
            let window = SeasonWindow::default();
            let (start, end) = window.bounds(2022).unwrap();
            assert_eq!(start, NaiveDate::from_ymd_opt(2022, 9, 1).unwrap());
            assert_eq!(end, NaiveDate::from_ymd_opt(2023, 3, 1).unwrap());
        }

        #[test]
        fn test_season_year_for() {
            let window = SeasonWindow::default();
            let nov = NaiveDate::from_ymd_opt(2022, 11, 20).unwrap();
            let feb = NaiveDate::from_ymd_opt(2023, 2, 28).unwrap();
            let mar = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
            assert_eq!(window.season_year_for(&nov), Some(2022));
            assert_eq!(window.season_year_for(&feb), Some(2022));
            assert_eq!(window.season_year_for(&mar), None);
        }

        #[test]
        fn test_non_wrapping_window() {
            let window = SeasonWindow {
                start_month: 1,
                start_day: 1,
                end_month: 7,
                end_day: 1,
            };
            let (start, end) = window.bounds(2023).unwrap();
            assert_eq!(start.year(), 2023);
            assert_eq!(end, NaiveDate::from_ymd_opt(2023, 7, 1).unwrap());
            let may = NaiveDate::from_ymd_opt(2023, 5, 5).unwrap();
            assert_eq!(window.season_year_for(&may), Some(2023));
        }
    }
}
