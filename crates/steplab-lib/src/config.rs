use crate::metrics::transient::TransientConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_FILE: &str = "processed_step_response_data.csv";

fn default_data_file() -> String {
    DEFAULT_DATA_FILE.to_string()
}

/// One labeled response in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub label: String,
    /// A CSV file, or a directory holding `data_file`.
    pub path: PathBuf,
}

/// A set of responses analyzed together, loaded from TOML.
///
/// ```toml
/// name = "proportional gains"
///
/// [analysis]
/// settling_tolerance = 0.05
///
/// [[series]]
/// label = "P=100"
/// path = "P_100_controller"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default)]
    pub analysis: TransientConfig,
    #[serde(default)]
    pub series: Vec<SeriesEntry>,
    /// Directory relative series paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl ComparisonManifest {
    /// Resolve an entry to the CSV file it names.
    pub fn resolve(&self, entry: &SeriesEntry) -> PathBuf {
        let path = if entry.path.is_absolute() {
            entry.path.clone()
        } else {
            self.base_dir.join(&entry.path)
        };
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            path
        } else {
            path.join(&self.data_file)
        }
    }

    /// `(label, file)` for every entry, in manifest order.
    pub fn resolved_entries(&self) -> Vec<(String, PathBuf)> {
        self.series
            .iter()
            .map(|entry| (entry.label.clone(), self.resolve(entry)))
            .collect()
    }
}

pub fn read_manifest(path: &Path) -> Result<ComparisonManifest> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let mut manifest: ComparisonManifest =
        toml::from_str(&contents).with_context(|| format!("parsing manifest {}", path.display()))?;
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}
