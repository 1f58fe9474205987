use crate::models::{ScoreResult, SnapshotEntry, UnscorableReason, Verdict};

/// Scores at or below this need full testing coverage to be shown.
pub const LOW_CONFIDENCE_CEILING: f64 = 200.0;
/// Scores at or below this read as "low risk".
pub const LOW_RISK_CEILING: f64 = 50.0;
/// Replacement score for low-risk readings backed by too little testing.
pub const LOW_TESTING_SCORE: f64 = 50.01;
pub const MIN_TESTS_PER_THOUSAND: f64 = 0.1;
pub const LOW_RISK_MIN_TESTS_PER_THOUSAND: f64 = 0.5;

pub fn cases_subscore(new_cases_smoothed_per_million: f64) -> f64 {
    100.0 * new_cases_smoothed_per_million / 100.0
}

pub fn positivity_subscore(positive_rate: f64) -> f64 {
    (100.0 * (positive_rate - 0.04) / 0.04).max(0.0)
}

pub fn deaths_subscore(new_deaths_smoothed_per_million: f64) -> f64 {
    100.0 * new_deaths_smoothed_per_million / 2.0
}

pub fn score_entry(entry: &SnapshotEntry) -> ScoreResult {
    let cases = entry.new_cases_smoothed_per_million;
    let positive_rate = entry.positive_rate;
    let deaths = entry.new_deaths_smoothed_per_million;
    let tests = entry.new_tests_smoothed_per_thousand;

    let subscores = [
        cases.map(cases_subscore),
        positive_rate.map(positivity_subscore),
        deaths.map(deaths_subscore),
    ];
    let missing = subscores.iter().filter(|s| s.is_none()).count();
    let mut explanation = Vec::new();

    let verdict = match subscores.iter().flatten().copied().reduce(f64::max) {
        None => Verdict::Unscorable {
            reason: UnscorableReason::AllDatapointsMissing,
        },
        Some(raw) => gate(raw, missing, tests, &mut explanation),
    };
    if let Verdict::Unscorable { reason } = verdict {
        explanation.insert(0, reason.to_string());
    }

    explanation.push(format!(
        "score1 = {} (new_cases_smoothed_per_million = {})",
        fmt_opt(subscores[0], 1),
        fmt_opt(cases, 1)
    ));
    explanation.push(format!(
        "score2 = {} (positive_rate = {})",
        fmt_opt(subscores[1], 1),
        fmt_opt(positive_rate, 3)
    ));
    explanation.push(format!(
        "score3 = {} (new_deaths_smoothed_per_million = {})",
        fmt_opt(subscores[2], 1),
        fmt_opt(deaths, 1)
    ));

    match (verdict.score(), tests) {
        (Some(score), None) if score > LOW_CONFIDENCE_CEILING => explanation.push(
            "number of tests not reported in the last 30 days (but score > 200)".to_string(),
        ),
        (_, Some(tests)) => explanation.push(format!(
            "new_tests_smoothed_per_thousand = {tests:.1} (from {})",
            entry.last_report_of_number_of_tests
        )),
        _ => {}
    }

    ScoreResult {
        verdict,
        explanation,
    }
}

fn gate(raw: f64, missing: usize, tests: Option<f64>, explanation: &mut Vec<String>) -> Verdict {
    if raw <= LOW_CONFIDENCE_CEILING {
        let reason = if missing > 1 {
            Some(UnscorableReason::TooManyMissing { missing })
        } else {
            match tests {
                None => Some(UnscorableReason::TestsNotReported),
                Some(t) if t < MIN_TESTS_PER_THOUSAND => Some(UnscorableReason::TooFewTests),
                Some(_) => None,
            }
        };
        if let Some(reason) = reason {
            return Verdict::Unscorable { reason };
        }
    }

    match tests {
        Some(t) if raw <= LOW_RISK_CEILING && t < LOW_RISK_MIN_TESTS_PER_THOUSAND => {
            explanation.push(
                "too few tests for score < 50 (requires new_tests_smoothed_per_thousand >= 0.5)"
                    .to_string(),
            );
            Verdict::Scored {
                score: LOW_TESTING_SCORE,
            }
        }
        _ => Verdict::Scored { score: raw },
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "n/a".to_string(),
    }
}
