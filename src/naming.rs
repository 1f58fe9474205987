use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::models::CountryScore;

/// Dataset names that differ from the boundary dataset's `NAME_LONG`.
const RENAMES: &[(&str, &str)] = &[
    ("South Korea", "Republic of Korea"),
    ("Russia", "Russian Federation"),
    ("Democratic Republic of Congo", "Democratic Republic of the Congo"),
    ("Sint Maarten (Dutch part)", "Sint Maarten"),
    ("Cote d'Ivoire", "Côte d'Ivoire"),
    ("Curacao", "Curaçao"),
    ("North Macedonia", "Macedonia"),
    ("Czechia", "Czech Republic"),
    ("Cape Verde", "Republic of Cabo Verde"),
];

pub fn normalize_location(name: &str) -> &str {
    RENAMES
        .iter()
        .find(|(dataset, _)| *dataset == name)
        .map(|(_, boundary)| *boundary)
        .unwrap_or(name)
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Deserialize)]
struct FeatureProperties {
    #[serde(rename = "NAME_LONG")]
    name_long: Option<String>,
}

pub fn parse_boundary_names(geojson: &str) -> anyhow::Result<Vec<String>> {
    let collection: FeatureCollection =
        serde_json::from_str(geojson).context("boundary file is not a GeoJSON feature collection")?;
    Ok(collection
        .features
        .into_iter()
        .filter_map(|feature| feature.properties.name_long)
        .collect())
}

/// Boundary names in file order, as the map layer lists them.
pub fn load_boundary_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading boundary file: {}", path.display()))?;
    parse_boundary_names(&data).with_context(|| format!("in {}", path.display()))
}

pub fn unmatched_countries(
    scores: &BTreeMap<String, CountryScore>,
    boundaries: &[String],
) -> Vec<String> {
    let known: BTreeSet<&str> = boundaries.iter().map(String::as_str).collect();
    scores
        .keys()
        .filter(|country| !known.contains(country.as_str()))
        .cloned()
        .collect()
}
