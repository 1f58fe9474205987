use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::models::{CountryScore, ScoreResult, TrendReport, Verdict};
use crate::risk;
use crate::snapshot;
use crate::store::RecordStore;

pub const TREND_OFFSET_DAYS: i64 = 7;

pub fn score_date(store: &RecordStore, date: NaiveDate) -> BTreeMap<String, ScoreResult> {
    snapshot::build_snapshot(store, date)
        .into_iter()
        .map(|(country, entry)| {
            let result = risk::score_entry(&entry);
            debug!(
                country = %entry.location,
                date = %entry.date,
                tests_from = %entry.last_report_of_number_of_tests,
                score = ?result.verdict.score(),
                "scored snapshot entry"
            );
            (country, result)
        })
        .collect()
}

pub fn trend(store: &RecordStore, date: NaiveDate) -> TrendReport {
    let current = score_date(store, date);
    let prior = score_date(store, date - Duration::days(TREND_OFFSET_DAYS));

    let mut report = TrendReport::default();
    for (country, result) in current {
        match result.verdict {
            Verdict::Scored { score } => {
                if let Some(previous) = prior.get(&country).and_then(|r| r.verdict.score()) {
                    report.deltas.insert(country.clone(), score - previous);
                }
                report.scores.insert(
                    country,
                    CountryScore {
                        score,
                        explanation: result.explanation,
                    },
                );
            }
            Verdict::Unscorable { .. } => {
                report.unranked.insert(country, result.explanation);
            }
        }
    }
    report
}
