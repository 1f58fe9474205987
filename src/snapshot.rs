use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::models::{Observation, SnapshotEntry};
use crate::store::RecordStore;

/// How far back a testing report may be borrowed from.
pub const TESTS_LOOKBACK_DAYS: i64 = 30;

/// Reconciles the store into one entry per country reporting on `target`.
///
/// Countries without a row dated exactly `target` are left out. For the
/// rest, the testing fields come from the most recent row within the
/// lookback window that has a test count; cases and deaths always come
/// from the exact-date row. Duplicate rows for one date are resolved by
/// `prefer_row`, never by input order.
pub fn build_snapshot(store: &RecordStore, target: NaiveDate) -> BTreeMap<String, SnapshotEntry> {
    let mut snapshot = BTreeMap::new();

    for (country, rows) in store.countries() {
        let Some(exact) = rows
            .iter()
            .filter(|row| row.date == target)
            .max_by(|a, b| prefer_row(a, b))
        else {
            continue;
        };

        let mut entry = SnapshotEntry {
            location: country.to_string(),
            date: target,
            new_cases_smoothed_per_million: exact.new_cases_smoothed_per_million,
            positive_rate: exact.positive_rate,
            new_tests_smoothed_per_thousand: exact.new_tests_smoothed_per_thousand,
            new_deaths_smoothed_per_million: exact.new_deaths_smoothed_per_million,
            last_report_of_number_of_tests: target,
        };

        if exact.new_tests_smoothed_per_thousand.is_none() {
            if let Some(report) = latest_test_report(rows, target) {
                entry.new_tests_smoothed_per_thousand = report.new_tests_smoothed_per_thousand;
                entry.positive_rate = report.positive_rate;
                entry.last_report_of_number_of_tests = report.date;
            }
        }

        snapshot.insert(country.to_string(), entry);
    }

    snapshot
}

/// Most recent earlier row in the window with a test count. Same-date
/// duplicates of `target` are excluded; the chosen exact row speaks for it.
fn latest_test_report(rows: &[Observation], target: NaiveDate) -> Option<&Observation> {
    let earliest = target - Duration::days(TESTS_LOOKBACK_DAYS);
    rows.iter()
        .filter(|row| row.date < target && row.date >= earliest)
        .filter(|row| row.new_tests_smoothed_per_thousand.is_some())
        .max_by(|a, b| a.date.cmp(&b.date).then_with(|| prefer_row(a, b)))
}

/// Total order over rows of the same date: more reported fields first,
/// then larger values field by field.
fn prefer_row(a: &Observation, b: &Observation) -> Ordering {
    let fields = |row: &Observation| {
        [
            row.new_cases_smoothed_per_million,
            row.positive_rate,
            row.new_tests_smoothed_per_thousand,
            row.new_deaths_smoothed_per_million,
        ]
    };
    let (a, b) = (fields(a), fields(b));
    let reported = |fields: &[Option<f64>; 4]| fields.iter().filter(|f| f.is_some()).count();

    reported(&a).cmp(&reported(&b)).then_with(|| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) => x.total_cmp(y),
                _ => x.is_some().cmp(&y.is_some()),
            })
            .find(|order| order.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
    }

    fn row(location: &str, date: NaiveDate) -> Observation {
        Observation {
            location: location.to_string(),
            date,
            new_cases_smoothed_per_million: None,
            positive_rate: None,
            new_tests_smoothed_per_thousand: None,
            new_deaths_smoothed_per_million: None,
        }
    }

    fn tests_row(location: &str, date: NaiveDate, tests: f64, positive_rate: f64) -> Observation {
        Observation {
            new_tests_smoothed_per_thousand: Some(tests),
            positive_rate: Some(positive_rate),
            ..row(location, date)
        }
    }

    #[test]
    fn adopts_stale_testing_report() {
        let mut today = row("Xland", day(20));
        today.new_cases_smoothed_per_million = Some(10.0);
        let store = RecordStore::from_observations(vec![
            tests_row("Xland", day(15), 1.2, 0.02),
            row("Xland", day(17)),
            today,
        ]);

        let snapshot = build_snapshot(&store, day(20));
        let entry = &snapshot["Xland"];
        assert_eq!(entry.new_cases_smoothed_per_million, Some(10.0));
        assert_eq!(entry.new_tests_smoothed_per_thousand, Some(1.2));
        assert_eq!(entry.positive_rate, Some(0.02));
        assert_eq!(entry.last_report_of_number_of_tests, day(15));
    }

    #[test]
    fn same_day_report_wins() {
        let mut today = tests_row("Xland", day(20), 3.0, 0.05);
        today.new_deaths_smoothed_per_million = Some(1.0);
        let store = RecordStore::from_observations(vec![
            tests_row("Xland", day(19), 2.0, 0.07),
            today,
        ]);

        let entry = &build_snapshot(&store, day(20))["Xland"];
        assert_eq!(entry.new_tests_smoothed_per_thousand, Some(3.0));
        assert_eq!(entry.positive_rate, Some(0.05));
        assert_eq!(entry.last_report_of_number_of_tests, day(20));
    }

    #[test]
    fn keeps_exact_day_values_when_nothing_to_borrow() {
        let mut today = row("Xland", day(20));
        today.positive_rate = Some(0.09);
        let store = RecordStore::from_observations(vec![row("Xland", day(10)), today]);

        let entry = &build_snapshot(&store, day(20))["Xland"];
        assert_eq!(entry.new_tests_smoothed_per_thousand, None);
        assert_eq!(entry.positive_rate, Some(0.09));
        assert_eq!(entry.last_report_of_number_of_tests, day(20));
    }

    #[test]
    fn never_borrows_from_future_or_beyond_lookback() {
        let target = day(31);
        let store = RecordStore::from_observations(vec![
            tests_row("Xland", target - Duration::days(31), 5.0, 0.01),
            row("Xland", target),
            tests_row("Xland", target + Duration::days(1), 6.0, 0.01),
        ]);
        let entry = &build_snapshot(&store, target)["Xland"];
        assert_eq!(entry.new_tests_smoothed_per_thousand, None);

        let store = RecordStore::from_observations(vec![
            tests_row("Xland", target - Duration::days(30), 5.0, 0.01),
            row("Xland", target),
        ]);
        let entry = &build_snapshot(&store, target)["Xland"];
        assert_eq!(entry.new_tests_smoothed_per_thousand, Some(5.0));
        assert_eq!(
            entry.last_report_of_number_of_tests,
            target - Duration::days(30)
        );
    }

    #[test]
    fn row_order_does_not_matter() {
        let rows = vec![
            tests_row("Xland", day(18), 1.5, 0.03),
            row("Xland", day(20)),
            tests_row("Xland", day(12), 0.8, 0.06),
            row("Xland", day(19)),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        let forward = build_snapshot(&RecordStore::from_observations(rows), day(20));
        let backward = build_snapshot(&RecordStore::from_observations(reversed), day(20));
        assert_eq!(forward, backward);
        assert_eq!(forward["Xland"].last_report_of_number_of_tests, day(18));
    }

    #[test]
    fn duplicate_rows_resolve_to_one_row_in_any_order() {
        let mut first = tests_row("Xland", day(20), 1.0, 0.01);
        first.new_cases_smoothed_per_million = Some(1.0);
        let mut second = tests_row("Xland", day(20), 2.0, 0.02);
        second.new_cases_smoothed_per_million = Some(2.0);
        let earlier = tests_row("Xland", day(18), 3.0, 0.03);

        let forward = build_snapshot(
            &RecordStore::from_observations(vec![earlier.clone(), first.clone(), second.clone()]),
            day(20),
        );
        let backward = build_snapshot(
            &RecordStore::from_observations(vec![second, first, earlier]),
            day(20),
        );
        assert_eq!(forward, backward);

        let entry = &forward["Xland"];
        assert_eq!(entry.new_cases_smoothed_per_million, Some(2.0));
        assert_eq!(entry.new_tests_smoothed_per_thousand, Some(2.0));
        assert_eq!(entry.positive_rate, Some(0.02));
        assert_eq!(entry.last_report_of_number_of_tests, day(20));
    }

    #[test]
    fn duplicate_without_tests_does_not_borrow_from_its_twin() {
        let mut bare = row("Xland", day(20));
        bare.new_cases_smoothed_per_million = Some(40.0);
        bare.new_deaths_smoothed_per_million = Some(1.0);
        let twin = tests_row("Xland", day(20), 2.0, 0.05);
        let earlier = tests_row("Xland", day(16), 0.7, 0.04);

        for rows in [
            vec![bare.clone(), twin.clone(), earlier.clone()],
            vec![earlier, twin, bare],
        ] {
            let entry = &build_snapshot(&RecordStore::from_observations(rows), day(20))["Xland"];
            assert_eq!(entry.new_cases_smoothed_per_million, Some(40.0));
            assert_eq!(entry.new_tests_smoothed_per_thousand, Some(0.7));
            assert_eq!(entry.positive_rate, Some(0.04));
            assert_eq!(entry.last_report_of_number_of_tests, day(16));
        }
    }

    #[test]
    fn rebuilding_yields_identical_snapshot() {
        let store = RecordStore::from_observations(vec![
            tests_row("Xland", day(14), 1.0, 0.02),
            row("Xland", day(20)),
            tests_row("Yland", day(20), 0.3, 0.1),
        ]);
        assert_eq!(build_snapshot(&store, day(20)), build_snapshot(&store, day(20)));
    }

    #[test]
    fn countries_without_exact_date_row_are_absent() {
        let store = RecordStore::from_observations(vec![
            tests_row("Xland", day(19), 1.0, 0.02),
            row("Yland", day(20)),
        ]);
        let snapshot = build_snapshot(&store, day(20));
        assert!(!snapshot.contains_key("Xland"));
        assert!(snapshot.contains_key("Yland"));
    }
}
