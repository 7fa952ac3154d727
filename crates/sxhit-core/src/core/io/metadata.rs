use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}", path = path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{images_per_trigger} images per trigger x {triggers} triggers overflows u64")]
    FrameCountOverflow {
        images_per_trigger: u64,
        triggers: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DetectorMetadata {
    #[serde(default)]
    pub name: Option<String>,
    pub x_pixels: u32,
    pub y_pixels: u32,
    /// Pixel pitch in millimetres.
    pub pixel_size: f64,
    /// Beam centre in pixels.
    pub beam_center_x: f64,
    pub beam_center_y: f64,
    /// Sample-to-detector distance in metres.
    pub distance: f64,
    /// Count-rate correction cutoff; counts above it are unreliable.
    pub count_cutoff: u32,
    /// Frame time in seconds.
    pub frame_time: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BeamMetadata {
    /// Incident wavelength in Ångström.
    pub wavelength: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GoniometerMetadata {
    pub omega_range_average: f64,
    #[serde(default)]
    pub omega_start: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AcquisitionMetadata {
    pub images_per_trigger: u64,
    pub triggers: u64,
}

/// Detector and acquisition description of a run, stored as `master.toml` next to
/// the containers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasterMetadata {
    pub detector: DetectorMetadata,
    pub beam: BeamMetadata,
    pub goniometer: GoniometerMetadata,
    pub acquisition: AcquisitionMetadata,
}

impl MasterMetadata {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| MetadataError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Total number of frames recorded in the run.
    pub fn total_frames(&self) -> Result<u64, MetadataError> {
        let images_per_trigger = self.acquisition.images_per_trigger;
        let triggers = self.acquisition.triggers;
        images_per_trigger
            .checked_mul(triggers)
            .ok_or(MetadataError::FrameCountOverflow {
                images_per_trigger,
                triggers,
            })
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_MASTER: &str = r#"
[detector]
name = "EIGER2 X 16M"
x-pixels = 4150
y-pixels = 4371
pixel-size = 0.075
beam-center-x = 2071.5
beam-center-y = 2201.0
distance = 0.125
count-cutoff = 126367
frame-time = 0.01

[beam]
wavelength = 0.9763

[goniometer]
omega-range-average = 0.1

[acquisition]
images-per-trigger = 1000
triggers = 3
"#;
