use std::fmt::Write;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DateRun, DateSummary, RunReport, TrendReport};

/// One country of the map layer handed to the external renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerEntry {
    pub name: String,
    pub score: Option<f64>,
    pub score_info: String,
    pub delta_info: String,
    pub explanation: Vec<String>,
}

fn fmt_points(value: Option<f64>, signed: bool) -> String {
    match (value, signed) {
        (Some(v), true) => format!("{v:+.1} points"),
        (Some(v), false) => format!("{v:.1} points"),
        (None, _) => "n/a".to_string(),
    }
}

pub fn summary_line(summary: &DateSummary) -> String {
    format!(
        "mean score: {} ({} countries), delta from a week ago: {}",
        fmt_points(summary.mean_score, false),
        summary.scored_count,
        fmt_points(summary.mean_delta, true)
    )
}

fn delta_info(delta: Option<f64>) -> String {
    match delta {
        Some(delta) => format!("delta from a week ago = {delta:+7.1} points"),
        None => "delta from a week ago = n/a".to_string(),
    }
}

pub fn build_report(date: NaiveDate, run: &DateRun) -> String {
    let trend = &run.trend;
    let mut output = String::new();

    let _ = writeln!(output, "# Covid score on {date}");
    let _ = writeln!(output, "{}", summary_line(&run.summary));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranking");

    let mut ranking: Vec<(&String, f64)> = trend
        .scores
        .iter()
        .map(|(country, score)| (country, score.score))
        .collect();
    ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if ranking.is_empty() {
        let _ = writeln!(output, "No countries could be scored for this date.");
    } else {
        for (rank, (country, score)) in ranking.iter().enumerate() {
            let delta = trend
                .deltas
                .get(*country)
                .map(|d| format!("{d:+.1}"))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                output,
                "{}. {} score {:.1} (delta {})",
                rank + 1,
                country,
                score,
                delta
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Unranked");

    if trend.unranked.is_empty() {
        let _ = writeln!(output, "Every reporting country was scored.");
    } else {
        for (country, explanation) in trend.unranked.iter() {
            let reason = explanation.first().map(String::as_str).unwrap_or("");
            let _ = writeln!(output, "- {country}: {reason}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Explanations");

    for (country, _) in ranking.iter() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {country}");
        for line in &trend.scores[*country].explanation {
            let _ = writeln!(output, "- {line}");
        }
    }

    output
}

/// Covers `boundaries` in order when given, otherwise every country the
/// trend knows about.
pub fn build_layer(
    date: NaiveDate,
    trend: &TrendReport,
    boundaries: Option<&[String]>,
) -> Vec<LayerEntry> {
    let names: Vec<String> = match boundaries {
        Some(names) => names.to_vec(),
        None => trend
            .scores
            .keys()
            .chain(trend.unranked.keys())
            .cloned()
            .collect(),
    };

    names
        .into_iter()
        .map(|name| {
            let delta_info = delta_info(trend.deltas.get(&name).copied());
            if let Some(scored) = trend.scores.get(&name) {
                LayerEntry {
                    score: Some(scored.score),
                    score_info: format!("score = {:.1} points", scored.score),
                    delta_info,
                    explanation: scored.explanation.clone(),
                    name,
                }
            } else if let Some(explanation) = trend.unranked.get(&name) {
                LayerEntry {
                    score: None,
                    score_info: "score not available".to_string(),
                    delta_info,
                    explanation: explanation.clone(),
                    name,
                }
            } else {
                LayerEntry {
                    score: None,
                    score_info: format!("no data available for {date}"),
                    delta_info,
                    explanation: Vec::new(),
                    name,
                }
            }
        })
        .collect()
}

pub fn build_index(run: &RunReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Covid scores");
    let _ = writeln!(output);
    let _ = writeln!(output, "Run {} generated on {}.", run.run_id, run.generated_on);
    let _ = writeln!(output);

    for (date, date_run) in run.dates.iter().rev() {
        let summary = &date_run.summary;
        let _ = writeln!(
            output,
            "- [{} {}](report-{}.md): mean score: {}, {} scored countries",
            date.format("%a"),
            date,
            date,
            fmt_points(summary.mean_score, false),
            summary.scored_count
        );
    }

    output
}

pub fn write_outputs(
    dir: &Path,
    run: &RunReport,
    boundaries: Option<&[String]>,
) -> anyhow::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("failed clearing output directory: {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("failed creating output directory: {}", dir.display()))?;

    for (date, date_run) in &run.dates {
        let report_path = dir.join(format!("report-{date}.md"));
        fs::write(&report_path, build_report(*date, date_run))
            .with_context(|| format!("failed writing {}", report_path.display()))?;

        let layer = build_layer(*date, &date_run.trend, boundaries);
        let layer_path = dir.join(format!("layer-{date}.json"));
        let json = serde_json::to_string_pretty(&layer)?;
        fs::write(&layer_path, json)
            .with_context(|| format!("failed writing {}", layer_path.display()))?;
    }

    let index_path = dir.join("index.md");
    fs::write(&index_path, build_index(run))
        .with_context(|| format!("failed writing {}", index_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CountryScore;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, 12).unwrap()
    }

    fn sample_trend() -> TrendReport {
        let mut trend = TrendReport::default();
        trend.scores.insert(
            "Germany".to_string(),
            CountryScore {
                score: 95.0,
                explanation: vec!["score1 = 95.0 (new_cases_smoothed_per_million = 95.0)".to_string()],
            },
        );
        trend.scores.insert(
            "Chile".to_string(),
            CountryScore {
                score: 210.5,
                explanation: vec![],
            },
        );
        trend.deltas.insert("Germany".to_string(), -3.4);
        trend.unranked.insert(
            "Tonga".to_string(),
            vec!["too many missing datapoints".to_string()],
        );
        trend
    }

    fn sample_run() -> DateRun {
        DateRun {
            trend: sample_trend(),
            summary: DateSummary {
                mean_score: Some(152.74),
                scored_count: 2,
                unranked_count: 1,
                mean_delta: Some(-3.4),
            },
        }
    }

    #[test]
    fn summary_line_renders_missing_means() {
        let summary = DateSummary {
            mean_score: None,
            scored_count: 0,
            unranked_count: 0,
            mean_delta: None,
        };
        assert_eq!(
            summary_line(&summary),
            "mean score: n/a (0 countries), delta from a week ago: n/a"
        );
    }

    #[test]
    fn report_ranks_by_descending_score() {
        let report = build_report(date(), &sample_run());
        assert!(report.contains("# Covid score on 2021-03-12"));
        assert!(report
            .contains("mean score: 152.7 points (2 countries), delta from a week ago: -3.4 points"));
        let chile = report.find("1. Chile score 210.5 (delta n/a)").unwrap();
        let germany = report.find("2. Germany score 95.0 (delta -3.4)").unwrap();
        assert!(chile < germany);
        assert!(report.contains("- Tonga: too many missing datapoints"));
    }

    #[test]
    fn layer_distinguishes_unranked_from_missing() {
        let boundaries = vec![
            "Germany".to_string(),
            "Tonga".to_string(),
            "Iceland".to_string(),
        ];
        let layer = build_layer(date(), &sample_trend(), Some(boundaries.as_slice()));
        assert_eq!(layer.len(), 3);

        assert_eq!(layer[0].score, Some(95.0));
        assert_eq!(layer[0].score_info, "score = 95.0 points");
        assert_eq!(layer[0].delta_info, "delta from a week ago =    -3.4 points");

        assert_eq!(layer[1].score_info, "score not available");
        assert_eq!(layer[1].delta_info, "delta from a week ago = n/a");
        assert_eq!(layer[1].explanation, vec!["too many missing datapoints"]);

        assert_eq!(layer[2].score_info, "no data available for 2021-03-12");
        assert!(layer[2].explanation.is_empty());
    }

    #[test]
    fn layer_without_boundaries_covers_reporting_countries() {
        let layer = build_layer(date(), &sample_trend(), None);
        let names: Vec<&str> = layer.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Chile", "Germany", "Tonga"]);
    }

    #[test]
    fn layer_json_carries_renderer_fields() {
        let layer = build_layer(date(), &sample_trend(), None);
        let json: serde_json::Value = serde_json::to_value(&layer).unwrap();
        let tonga = &json[2];
        assert_eq!(tonga["name"], "Tonga");
        assert!(tonga["score"].is_null());
        assert_eq!(tonga["score_info"], "score not available");
        assert_eq!(tonga["delta_info"], "delta from a week ago = n/a");
        assert_eq!(tonga["explanation"][0], "too many missing datapoints");
    }

    #[test]
    fn index_lists_newest_first() {
        let mut dates = BTreeMap::new();
        dates.insert(date(), sample_run());
        dates.insert(date() - chrono::Duration::days(7), sample_run());
        let run = RunReport {
            run_id: Uuid::nil(),
            generated_on: date(),
            dates,
        };

        let index = build_index(&run);
        let newest = index.find("[Fri 2021-03-12](report-2021-03-12.md)").unwrap();
        let oldest = index.find("[Fri 2021-03-05](report-2021-03-05.md)").unwrap();
        assert!(newest < oldest);
        assert!(index.contains("mean score: 152.7 points, 2 scored countries"));
    }
}
