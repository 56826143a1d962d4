use crate::{
    date_range::DateRange,
    error::SourceError,
    observation::{RawSeries, SeriesPoint},
};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use log::debug;
use snow_utils::dates::{format_date, parse_date_lenient};

/// Lines starting with this marker are comments in the station report.
pub const COMMENT_MARKER: char = '#';

/// Default report generator endpoint for daily single-station reports.
pub const REPORT_BASE_URL: &str =
    "https://wcc.sc.egov.usda.gov/reportGenerator/view_csv/customSingleStationReport/daily";

/// Element codes requested by default: snow water equivalent and
/// accumulated precipitation.
pub const DEFAULT_ELEMENTS: &[&str] = &["WTEQ::value", "PREC::value"];

/// Build the report URL for one station over `range`.
///
/// `code` is the station triplet, e.g. "335:CO:SNTL".
pub fn report_url(base_url: &str, code: &str, range: &DateRange, elements: &[&str]) -> String {
    format!(
        "{}/{}%7Cid=%22%22%7Cname/{},{}/{}",
        base_url.trim_end_matches('/'),
        code,
        format_date(&range.start),
        format_date(&range.end),
        elements.join(",")
    )
}

/// Remove comment and blank lines from a report body.
pub fn strip_comments(body: &str) -> String {
    body.lines()
        .filter(|line| !line.starts_with(COMMENT_MARKER) && !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The unit in parentheses inside a column header, e.g. "in" for
/// "Snow Water Equivalent (in) Start of Day Values".
pub fn unit_from_header(header: &str) -> String {
    match (header.find('('), header.find(')')) {
        (Some(open), Some(close)) if open < close => header[open + 1..close].trim().to_string(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StationRow {
    date: NaiveDate,
    values: Vec<Option<f64>>,
}

/// A parsed station report: a date column followed by named variables.
#[derive(Debug, Clone, PartialEq)]
pub struct StationTable {
    headers: Vec<String>,
    rows: Vec<StationRow>,
}

impl StationTable {
    /// Parse a delimited report body. Comment lines are stripped first; the
    /// first column must be the date. Empty or unparseable cells become
    /// missing values; rows without a parseable date are skipped.
    pub fn parse(source_name: &str, body: &str) -> Result<StationTable, SourceError> {
        let cleaned = strip_comments(body);
        if cleaned.is_empty() {
            return Err(SourceError::unavailable(source_name, "no data lines in report"));
        }
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(cleaned.as_bytes());
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| SourceError::unavailable(source_name, format!("bad report header: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.len() < 2 {
            return Err(SourceError::unavailable(
                source_name,
                "report has no variable columns",
            ));
        }
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    debug!("{source_name}: skipping unreadable row: {e}");
                    continue;
                }
            };
            let date = match record.get(0).map(parse_date_lenient) {
                Some(Ok(d)) => d,
                _ => {
                    debug!("{source_name}: skipping row without a date: {:?}", record);
                    continue;
                }
            };
            let values = (1..headers.len())
                .map(|i| record.get(i).and_then(|s| s.trim().parse::<f64>().ok()))
                .collect();
            rows.push(StationRow { date, values });
        }
        Ok(StationTable { headers, rows })
    }

    /// Variable column names, date column excluded.
    pub fn variables(&self) -> &[String] {
        &self.headers[1..]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The named column as a raw series.
    pub fn column(&self, name: &str) -> Option<RawSeries> {
        let index = self.variables().iter().position(|h| h == name)?;
        Some(RawSeries {
            unit: unit_from_header(name),
            points: self
                .rows
                .iter()
                .map(|row| SeriesPoint {
                    date: row.date,
                    value: row.values[index],
                })
                .collect(),
        })
    }
}
