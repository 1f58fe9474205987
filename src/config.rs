use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "covid-risk.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub boundaries: BoundariesConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_url")]
    pub url: String,
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoundariesConfig {
    /// GeoJSON file whose `NAME_LONG` properties name the map's countries.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// First weekly date; every 7th day after it is processed.
    #[serde(default = "default_epoch")]
    pub epoch: NaiveDate,
    /// Days before today that are always processed.
    #[serde(default = "default_recent_days")]
    pub recent_days: Vec<i64>,
    #[serde(default)]
    pub only_weekly: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub dataset_path: Option<PathBuf>,
    pub boundaries_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub only_weekly: bool,
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.dataset_path {
            self.dataset.path = path;
        }
        if let Some(path) = overrides.boundaries_path {
            self.boundaries.path = Some(path);
        }
        if let Some(dir) = overrides.output_dir {
            self.output.dir = dir;
        }
        if overrides.only_weekly {
            self.schedule.only_weekly = true;
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            url: default_dataset_url(),
            path: default_dataset_path(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            epoch: default_epoch(),
            recent_days: default_recent_days(),
            only_weekly: false,
        }
    }
}

fn default_dataset_url() -> String {
    "https://covid.ourworldindata.org/data/owid-covid-data.csv".to_string()
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("owid-covid-data.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 6).unwrap_or_default()
}

fn default_recent_days() -> Vec<i64> {
    vec![1, 2, 3]
}
