//! Configuration types for a processing run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::correction::CorrectionOptions;
use crate::data::filter::ColumnFilter;
use crate::data::shape::LayoutRules;
use crate::dose_response::DoseResponseOptions;
use crate::error::Result;
use crate::labels::LabelOptions;
use crate::reorder::ReorderOptions;

/// File format of merged/sorted tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub merged_format: OutputFormat,
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Blank wells in well-address notation, e.g. `"H10, H11, H12"`.
    #[serde(default = "default_blank_wells")]
    pub blank_wells: String,

    /// Name of the reporter signal, used in output file names.
    #[serde(default = "default_reporter_name")]
    pub reporter_name: String,

    #[serde(default)]
    pub correction: CorrectionOptions,

    #[serde(default)]
    pub labels: LabelOptions,

    #[serde(default)]
    pub merge: ColumnFilter,

    #[serde(default)]
    pub layout: LayoutRules,

    #[serde(default)]
    pub reorder: ReorderOptions,

    #[serde(default)]
    pub dose_response: DoseResponseOptions,

    #[serde(default)]
    pub output: OutputConfig,
}

fn default_blank_wells() -> String {
    "H10, H11, H12".to_string()
}

fn default_reporter_name() -> String {
    "lux".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blank_wells: default_blank_wells(),
            reporter_name: default_reporter_name(),
            correction: CorrectionOptions::default(),
            labels: LabelOptions::default(),
            merge: ColumnFilter::default(),
            layout: LayoutRules::default(),
            reorder: ReorderOptions::default(),
            dose_response: DoseResponseOptions::default(),
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
