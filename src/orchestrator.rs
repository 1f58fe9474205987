use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use tracing::info;
use uuid::Uuid;

use crate::config::ScheduleConfig;
use crate::models::{DateRun, DateSummary, RunReport, TrendReport};
use crate::store::RecordStore;
use crate::trend;

pub fn select_dates(today: NaiveDate, schedule: &ScheduleConfig) -> BTreeSet<NaiveDate> {
    let mut dates = BTreeSet::new();
    if !schedule.only_weekly {
        for days_ago in &schedule.recent_days {
            dates.insert(today - Duration::days(*days_ago));
        }
    }

    let mut date = schedule.epoch;
    while date < today {
        dates.insert(date);
        date += Duration::days(7);
    }
    dates
}

pub fn summarize(trend: &TrendReport) -> DateSummary {
    DateSummary {
        mean_score: mean(trend.scores.values().map(|s| s.score)),
        scored_count: trend.scores.len(),
        unranked_count: trend.unranked.len(),
        mean_delta: mean(trend.deltas.values().copied()),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn run(store: &RecordStore, dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> RunReport {
    let mut per_date = BTreeMap::new();
    for &date in dates {
        let trend = trend::trend(store, date);
        let summary = summarize(&trend);
        info!(
            %date,
            scored = summary.scored_count,
            unranked = summary.unranked_count,
            mean_score = ?summary.mean_score,
            mean_delta = ?summary.mean_delta,
            "computed scores"
        );
        per_date.insert(date, DateRun { trend, summary });
    }

    RunReport {
        run_id: Uuid::new_v4(),
        generated_on: today,
        dates: per_date,
    }
}
