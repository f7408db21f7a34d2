use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{is_missing_value, Column, NormalizedRow, SEARCHABLE_COLUMNS};

pub const MAX_SCORE: u8 = 10;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchColumn {
    All,
    Column(Column),
}

impl FromStr for SearchColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(SearchColumn::All)
        } else {
            s.parse().map(SearchColumn::Column)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentFilter {
    All,
    /// Rows whose agent name is a placeholder.
    Unknown,
    Named(String),
}

impl FromStr for AgentFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "All" => AgentFilter::All,
            "Unknown" => AgentFilter::Unknown,
            name => AgentFilter::Named(name.to_string()),
        })
    }
}

/// Inclusive range of whole calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Start is taken at 00:00:00 and end at 23:59:59, so the time of day
    /// on the call never matters, only its date.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub search_term: String,
    pub search_column: SearchColumn,
    pub agent: AgentFilter,
    pub max_score: u8,
    pub date_range: Option<DateRange>,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            search_column: SearchColumn::All,
            agent: AgentFilter::All,
            max_score: MAX_SCORE,
            date_range: None,
        }
    }
}

impl QueryDescriptor {
    pub fn matches(&self, row: &NormalizedRow) -> bool {
        self.matches_search(row)
            && self.matches_agent(row)
            && row.total_score <= self.max_score
            && self.matches_date(row)
    }

    fn matches_search(&self, row: &NormalizedRow) -> bool {
        let term = self.search_term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        let contains = |column: Column| row.value(column).to_lowercase().contains(&term);
        match self.search_column {
            SearchColumn::All => SEARCHABLE_COLUMNS.into_iter().any(contains),
            SearchColumn::Column(column) => contains(column),
        }
    }

    fn matches_agent(&self, row: &NormalizedRow) -> bool {
        match &self.agent {
            AgentFilter::All => true,
            AgentFilter::Unknown => is_missing_value(&row.consultant_name),
            AgentFilter::Named(name) => row.consultant_name == *name,
        }
    }

    fn matches_date(&self, row: &NormalizedRow) -> bool {
        match &self.date_range {
            None => true,
            Some(range) => parse_call_date(&row.date_of_call).is_some_and(|date| range.contains(date)),
        }
    }
}

/// Keeps the rows the query accepts, in input order.
pub fn filter<'a>(rows: &'a [NormalizedRow], query: &QueryDescriptor) -> Vec<&'a NormalizedRow> {
    rows.iter().filter(|row| query.matches(row)).collect()
}

/// Reads a call date in any of the formats the audit service has been seen to emit.
pub fn parse_call_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if is_missing_value(value) {
        return None;
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.date_naive());
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(timestamp.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}
