use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

/// One row of the daily time series. Empty or non-numeric cells are `None`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Observation {
    pub location: String,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub new_cases_smoothed_per_million: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub positive_rate: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub new_tests_smoothed_per_thousand: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub new_deaths_smoothed_per_million: Option<f64>,
}

/// A country's reconciled view of one target date.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub location: String,
    pub date: NaiveDate,
    pub new_cases_smoothed_per_million: Option<f64>,
    pub positive_rate: Option<f64>,
    pub new_tests_smoothed_per_thousand: Option<f64>,
    pub new_deaths_smoothed_per_million: Option<f64>,
    /// Date the testing fields were actually reported on.
    pub last_report_of_number_of_tests: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Scored { score: f64 },
    Unscorable { reason: UnscorableReason },
}

impl Verdict {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Scored { score } => Some(*score),
            Self::Unscorable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnscorableReason {
    AllDatapointsMissing,
    TooManyMissing { missing: usize },
    TestsNotReported,
    TooFewTests,
}

impl fmt::Display for UnscorableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllDatapointsMissing => write!(f, "too many missing datapoints"),
            Self::TooManyMissing { missing } => write!(
                f,
                "too many missing datapoints for score < 200 ({missing} of 3 missing)"
            ),
            Self::TestsNotReported => write!(
                f,
                "number of tests not reported in the last 30 days (and score <= 200)"
            ),
            Self::TooFewTests => write!(
                f,
                "too few tests for score < 200 (new_tests_smoothed_per_thousand < 0.1)"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub verdict: Verdict,
    pub explanation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryScore {
    pub score: f64,
    pub explanation: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendReport {
    pub scores: BTreeMap<String, CountryScore>,
    pub deltas: BTreeMap<String, f64>,
    pub unranked: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateSummary {
    pub mean_score: Option<f64>,
    pub scored_count: usize,
    pub unranked_count: usize,
    pub mean_delta: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DateRun {
    pub trend: TrendReport,
    pub summary: DateSummary,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_on: NaiveDate,
    pub dates: BTreeMap<NaiveDate, DateRun>,
}
