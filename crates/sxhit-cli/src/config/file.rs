use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use sxhit::engine::config::FramePolicy;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileFramePolicy {
    Skip,
    Abort,
}

impl From<FileFramePolicy> for FramePolicy {
    fn from(p: FileFramePolicy) -> Self {
        match p {
            FileFramePolicy::Skip => FramePolicy::Skip,
            FileFramePolicy::Abort => FramePolicy::Abort,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileRunConfig {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub cutoff: Option<f64>,
    pub nproc: Option<usize>,
    pub output: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub on_scoring_error: Option<FileFramePolicy>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSpotDetectionConfig {
    pub spot_size: Option<u32>,
    pub spot_level: Option<u32>,
    pub pixel_min: Option<u32>,
    pub fraction_polarization: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileRoiConfig {
    pub ix_min: Option<u32>,
    pub ix_max: Option<u32>,
    pub iy_min: Option<u32>,
    pub iy_max: Option<u32>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub run: Option<FileRunConfig>,
    pub spot_detection: Option<FileSpotDetectionConfig>,
    pub roi: Option<FileRoiConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading run configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
