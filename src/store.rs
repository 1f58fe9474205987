use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};
use tracing::{debug, warn};

use crate::models::Observation;
use crate::naming;

const REQUIRED_COLUMNS: [&str; 2] = ["location", "date"];

/// Read-only observations grouped by normalized country name.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    by_country: BTreeMap<String, Vec<Observation>>,
}

impl RecordStore {
    pub fn from_observations(observations: impl IntoIterator<Item = Observation>) -> Self {
        let mut by_country: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for mut observation in observations {
            observation.location = naming::normalize_location(&observation.location).to_string();
            by_country
                .entry(observation.location.clone())
                .or_default()
                .push(observation);
        }
        Self { by_country }
    }

    pub fn from_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers().context("failed reading CSV header")?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|header| header == column) {
                bail!("CSV is missing required column `{column}`");
            }
        }

        let mut observations = Vec::new();
        let mut skipped = 0usize;
        for result in reader.deserialize::<Observation>() {
            match result {
                Ok(observation) => observations.push(observation),
                Err(err) if matches!(err.kind(), csv::ErrorKind::Deserialize { .. }) => {
                    skipped += 1;
                    warn!(error = %err, "skipping unreadable row");
                }
                Err(err) => return Err(err).context("failed reading CSV row"),
            }
        }

        debug!(rows = observations.len(), skipped, "parsed observations");
        Ok(Self::from_observations(observations))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed opening dataset: {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("in {}", path.display()))
    }

    pub fn countries(&self) -> impl Iterator<Item = (&str, &[Observation])> {
        self.by_country
            .iter()
            .map(|(country, rows)| (country.as_str(), rows.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.by_country.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_country.is_empty()
    }
}
