//! The flat `key value` configuration artifact consumed by the scoring engine.

use crate::core::io::metadata::MasterMetadata;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Oscillation ranges below this are treated as still exposures.
pub const MIN_OSCILLATION_RANGE: f64 = 0.01;
/// Oscillation range written for still exposures.
pub const STILL_OSCILLATION_RANGE: f64 = 0.0001;

pub const DEFAULT_PIXEL_MIN: u32 = 0;
pub const DEFAULT_FRACTION_POLARIZATION: f64 = 0.99;
pub const DEFAULT_SPOT_SIZE: u32 = 2;
pub const DEFAULT_SPOT_LEVEL: u32 = 6;

const END_MARKER: &str = "end";

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ScoringConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Unknown configuration key '{key}' on line {line}")]
    UnknownKey { key: String, line: usize },
    #[error("Configuration key '{key}' is repeated on line {line}")]
    DuplicateKey { key: String, line: usize },
    #[error("Configuration text is not terminated by an 'end' line")]
    MissingEnd,
}

/// Binning region of interest, in detector pixels. All zeros means "whole detector".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorRoi {
    pub ix_min: u32,
    pub ix_max: u32,
    pub iy_min: u32,
    pub iy_max: u32,
}

impl DetectorRoi {
    pub fn is_full_detector(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub detector: Option<String>,
    pub nx: u32,
    pub ny: u32,
    /// Pixel pitch in millimetres.
    pub pixel: f64,
    pub pixel_min: u32,
    pub pixel_max: u32,
    pub fraction_polarization: f64,
    /// Sample-to-detector distance in millimetres.
    pub detector_distance: f64,
    pub wavelength: f64,
    pub orgx: f64,
    pub orgy: f64,
    pub spot_size: u32,
    pub spot_level: u32,
    pub exposure: f64,
    pub oscillation_range: f64,
    /// Angular step between consecutive images, in degrees.
    pub image_step: Option<f64>,
    pub starting_angle: Option<f64>,
    pub roi: DetectorRoi,
}

impl ScoringConfig {
    /// Renders the artifact: one `key value` pair per line, closed by `end`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(detector) = &self.detector {
            let _ = writeln!(out, "detector {}", detector);
        }
        let _ = writeln!(out, "nx {}", self.nx);
        let _ = writeln!(out, "ny {}", self.ny);
        let _ = writeln!(out, "pixel {}", self.pixel);
        let _ = writeln!(out, "pixel_min {}", self.pixel_min);
        let _ = writeln!(out, "pixel_max {}", self.pixel_max);
        let _ = writeln!(out, "fraction_polarization {}", self.fraction_polarization);
        let _ = writeln!(out, "detector_distance {}", self.detector_distance);
        let _ = writeln!(out, "X-ray_wavelength {}", self.wavelength);
        let _ = writeln!(out, "orgx {}", self.orgx);
        let _ = writeln!(out, "orgy {}", self.orgy);
        let _ = writeln!(out, "spot_size {}", self.spot_size);
        let _ = writeln!(out, "spot_level {}", self.spot_level);
        let _ = writeln!(out, "exposure {}", self.exposure);
        let _ = writeln!(out, "oscillation_range {}", self.oscillation_range);
        if let Some(step) = self.image_step {
            let _ = writeln!(out, "image_step {}", step);
        }
        if let Some(angle) = self.starting_angle {
            let _ = writeln!(out, "starting_angle {}", angle);
        }
        let _ = writeln!(out, "ix_min {}", self.roi.ix_min);
        let _ = writeln!(out, "ix_max {}", self.roi.ix_max);
        let _ = writeln!(out, "iy_min {}", self.roi.iy_min);
        let _ = writeln!(out, "iy_max {}", self.roi.iy_max);
        out.push_str(END_MARKER);
        out
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.render())
    }

    /// Parses a rendered artifact. Blank lines and lines starting with `!` or `#` are
    /// ignored; everything after the `end` line is ignored.
    pub fn parse(text: &str) -> Result<Self, ScoringConfigError> {
        let mut builder = ScoringConfigBuilder::new();
        let mut seen = HashSet::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('!') || line.starts_with('#') {
                continue;
            }
            if line == END_MARKER {
                return builder.build();
            }

            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None => (line, ""),
            };
            if !seen.insert(key.to_string()) {
                return Err(ScoringConfigError::DuplicateKey {
                    key: key.to_string(),
                    line: line_no,
                });
            }
            builder = builder.apply_pair(key, value, line_no)?;
        }
        Err(ScoringConfigError::MissingEnd)
    }
}

#[derive(Default, Debug, Clone)]
pub struct ScoringConfigBuilder {
    detector: Option<String>,
    nx: Option<u32>,
    ny: Option<u32>,
    pixel: Option<f64>,
    pixel_min: Option<u32>,
    pixel_max: Option<u32>,
    fraction_polarization: Option<f64>,
    detector_distance: Option<f64>,
    wavelength: Option<f64>,
    orgx: Option<f64>,
    orgy: Option<f64>,
    spot_size: Option<u32>,
    spot_level: Option<u32>,
    exposure: Option<f64>,
    oscillation_range: Option<f64>,
    image_step: Option<f64>,
    starting_angle: Option<f64>,
    roi: Option<DetectorRoi>,
}

impl ScoringConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the geometry and acquisition keys from run metadata.
    ///
    /// The detector distance is converted from metres to millimetres and the
    /// count-rate cutoff becomes `pixel_max`.
    pub fn from_metadata(meta: &MasterMetadata) -> Self {
        let mut builder = Self::new()
            .nx(meta.detector.x_pixels)
            .ny(meta.detector.y_pixels)
            .pixel(meta.detector.pixel_size)
            .pixel_max(meta.detector.count_cutoff)
            .orgx(meta.detector.beam_center_x)
            .orgy(meta.detector.beam_center_y)
            .detector_distance(meta.detector.distance * 1000.0)
            .wavelength(meta.beam.wavelength)
            .exposure(meta.detector.frame_time)
            .oscillation_range(meta.goniometer.omega_range_average);
        if let Some(name) = &meta.detector.name {
            builder = builder.detector(name.clone());
        }
        if let Some(angle) = meta.goniometer.omega_start {
            builder = builder.starting_angle(angle);
        }
        builder
    }

    pub fn detector(mut self, name: String) -> Self {
        self.detector = Some(name);
        self
    }
    pub fn nx(mut self, nx: u32) -> Self {
        self.nx = Some(nx);
        self
    }
    pub fn ny(mut self, ny: u32) -> Self {
        self.ny = Some(ny);
        self
    }
    pub fn pixel(mut self, pixel: f64) -> Self {
        self.pixel = Some(pixel);
        self
    }
    pub fn pixel_min(mut self, value: u32) -> Self {
        self.pixel_min = Some(value);
        self
    }
    pub fn pixel_max(mut self, value: u32) -> Self {
        self.pixel_max = Some(value);
        self
    }
    pub fn fraction_polarization(mut self, value: f64) -> Self {
        self.fraction_polarization = Some(value);
        self
    }
    pub fn detector_distance(mut self, mm: f64) -> Self {
        self.detector_distance = Some(mm);
        self
    }
    pub fn wavelength(mut self, angstrom: f64) -> Self {
        self.wavelength = Some(angstrom);
        self
    }
    pub fn orgx(mut self, x: f64) -> Self {
        self.orgx = Some(x);
        self
    }
    pub fn orgy(mut self, y: f64) -> Self {
        self.orgy = Some(y);
        self
    }
    pub fn spot_size(mut self, size: u32) -> Self {
        self.spot_size = Some(size);
        self
    }
    pub fn spot_level(mut self, level: u32) -> Self {
        self.spot_level = Some(level);
        self
    }
    pub fn exposure(mut self, seconds: f64) -> Self {
        self.exposure = Some(seconds);
        self
    }
    pub fn oscillation_range(mut self, degrees: f64) -> Self {
        self.oscillation_range = Some(degrees);
        self
    }
    pub fn image_step(mut self, degrees: f64) -> Self {
        self.image_step = Some(degrees);
        self
    }
    pub fn starting_angle(mut self, degrees: f64) -> Self {
        self.starting_angle = Some(degrees);
        self
    }
    pub fn roi(mut self, roi: DetectorRoi) -> Self {
        self.roi = Some(roi);
        self
    }

    fn apply_pair(
        mut self,
        key: &str,
        value: &str,
        line: usize,
    ) -> Result<Self, ScoringConfigError> {
        let mut roi = self.roi.unwrap_or_default();
        match key {
            "detector" => self.detector = Some(value.to_string()),
            "nx" => self.nx = Some(parse_value(key, value)?),
            "ny" => self.ny = Some(parse_value(key, value)?),
            "pixel" => self.pixel = Some(parse_value(key, value)?),
            "pixel_min" => self.pixel_min = Some(parse_value(key, value)?),
            "pixel_max" => self.pixel_max = Some(parse_value(key, value)?),
            "fraction_polarization" => {
                self.fraction_polarization = Some(parse_value(key, value)?)
            }
            "detector_distance" => self.detector_distance = Some(parse_value(key, value)?),
            "X-ray_wavelength" => self.wavelength = Some(parse_value(key, value)?),
            "orgx" => self.orgx = Some(parse_value(key, value)?),
            "orgy" => self.orgy = Some(parse_value(key, value)?),
            "spot_size" => self.spot_size = Some(parse_value(key, value)?),
            "spot_level" => self.spot_level = Some(parse_value(key, value)?),
            "exposure" => self.exposure = Some(parse_value(key, value)?),
            "oscillation_range" => self.oscillation_range = Some(parse_value(key, value)?),
            "image_step" => self.image_step = Some(parse_value(key, value)?),
            "starting_angle" => self.starting_angle = Some(parse_value(key, value)?),
            "ix_min" => roi.ix_min = parse_value(key, value)?,
            "ix_max" => roi.ix_max = parse_value(key, value)?,
            "iy_min" => roi.iy_min = parse_value(key, value)?,
            "iy_max" => roi.iy_max = parse_value(key, value)?,
            _ => {
                return Err(ScoringConfigError::UnknownKey {
                    key: key.to_string(),
                    line,
                });
            }
        }
        if key.starts_with("ix_") || key.starts_with("iy_") {
            self.roi = Some(roi);
        }
        Ok(self)
    }

    pub fn build(self) -> Result<ScoringConfig, ScoringConfigError> {
        let mut oscillation_range = self
            .oscillation_range
            .ok_or(ScoringConfigError::MissingParameter("oscillation_range"))?;
        if oscillation_range < MIN_OSCILLATION_RANGE {
            oscillation_range = STILL_OSCILLATION_RANGE;
        }

        let config = ScoringConfig {
            detector: self.detector,
            nx: self.nx.ok_or(ScoringConfigError::MissingParameter("nx"))?,
            ny: self.ny.ok_or(ScoringConfigError::MissingParameter("ny"))?,
            pixel: self
                .pixel
                .ok_or(ScoringConfigError::MissingParameter("pixel"))?,
            pixel_min: self.pixel_min.unwrap_or(DEFAULT_PIXEL_MIN),
            pixel_max: self
                .pixel_max
                .ok_or(ScoringConfigError::MissingParameter("pixel_max"))?,
            fraction_polarization: self
                .fraction_polarization
                .unwrap_or(DEFAULT_FRACTION_POLARIZATION),
            detector_distance: self
                .detector_distance
                .ok_or(ScoringConfigError::MissingParameter("detector_distance"))?,
            wavelength: self
                .wavelength
                .ok_or(ScoringConfigError::MissingParameter("X-ray_wavelength"))?,
            orgx: self
                .orgx
                .ok_or(ScoringConfigError::MissingParameter("orgx"))?,
            orgy: self
                .orgy
                .ok_or(ScoringConfigError::MissingParameter("orgy"))?,
            spot_size: self.spot_size.unwrap_or(DEFAULT_SPOT_SIZE),
            spot_level: self.spot_level.unwrap_or(DEFAULT_SPOT_LEVEL),
            exposure: self
                .exposure
                .ok_or(ScoringConfigError::MissingParameter("exposure"))?,
            oscillation_range,
            image_step: self.image_step,
            starting_angle: self.starting_angle,
            roi: self.roi.unwrap_or_default(),
        };
        validate(&config)?;
        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ScoringConfigError> {
    value.parse().map_err(|_| ScoringConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("cannot parse '{}'", value),
    })
}

fn invalid(key: &str, reason: impl Into<String>) -> ScoringConfigError {
    ScoringConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate(config: &ScoringConfig) -> Result<(), ScoringConfigError> {
    if config.nx == 0 || config.ny == 0 {
        return Err(invalid("nx/ny", "detector dimensions must be non-zero"));
    }
    if !(config.pixel > 0.0) {
        return Err(invalid("pixel", "pixel size must be positive"));
    }
    if !(config.wavelength > 0.0) {
        return Err(invalid("X-ray_wavelength", "wavelength must be positive"));
    }
    if !(config.detector_distance > 0.0) {
        return Err(invalid("detector_distance", "distance must be positive"));
    }
    if config.pixel_max <= config.pixel_min {
        return Err(invalid(
            "pixel_max",
            format!(
                "must exceed pixel_min ({} <= {})",
                config.pixel_max, config.pixel_min
            ),
        ));
    }
    if config.spot_size == 0 {
        return Err(invalid("spot_size", "must be at least 1"));
    }
    let roi = config.roi;
    if !roi.is_full_detector() {
        if roi.ix_min > roi.ix_max || roi.iy_min > roi.iy_max {
            return Err(invalid("ix/iy", "ROI minimum exceeds maximum"));
        }
        if roi.ix_max >= config.nx || roi.iy_max >= config.ny {
            return Err(invalid("ix/iy", "ROI extends past the detector"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::metadata::SAMPLE_MASTER;

    fn sample_config() -> ScoringConfig {
        let meta = MasterMetadata::from_toml_str(SAMPLE_MASTER).unwrap();
        ScoringConfigBuilder::from_metadata(&meta).build().unwrap()
    }

    #[test]
    fn from_metadata_derives_geometry_and_units() {
        let config = sample_config();
        assert_eq!(config.nx, 4150);
        assert_eq!(config.ny, 4371);
        assert_eq!(config.pixel_max, 126367);
        assert!((config.detector_distance - 125.0).abs() < 1e-9);
        assert_eq!(config.orgx, 2071.5);
        assert_eq!(config.exposure, 0.01);
        assert_eq!(config.oscillation_range, 0.1);
        assert_eq!(config.spot_size, DEFAULT_SPOT_SIZE);
        assert_eq!(config.spot_level, DEFAULT_SPOT_LEVEL);
        assert_eq!(config.fraction_polarization, DEFAULT_FRACTION_POLARIZATION);
        assert_eq!(config.detector.as_deref(), Some("EIGER2 X 16M"));
        assert!(config.roi.is_full_detector());
    }

    #[test]
    fn tiny_oscillation_range_is_treated_as_still() {
        let meta = MasterMetadata::from_toml_str(
            &SAMPLE_MASTER.replace("omega-range-average = 0.1", "omega-range-average = 0.0"),
        )
        .unwrap();
        let config = ScoringConfigBuilder::from_metadata(&meta).build().unwrap();
        assert_eq!(config.oscillation_range, STILL_OSCILLATION_RANGE);
    }

    #[test]
    fn render_is_key_value_lines_terminated_by_end() {
        let text = sample_config().render();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.last(), Some(&"end"));
        assert!(lines.contains(&"nx 4150"));
        assert!(lines.contains(&"X-ray_wavelength 0.9763"));
        assert!(lines.contains(&"detector_distance 125"));
        assert!(lines.contains(&"ix_max 0"));
        for line in &lines[..lines.len() - 1] {
            assert!(line.split_whitespace().count() >= 2, "line: {}", line);
        }
    }

    #[test]
    fn parse_reads_back_rendered_config() {
        let config = sample_config();
        assert_eq!(ScoringConfig::parse(&config.render()).unwrap(), config);
    }

    #[test]
    fn image_step_is_written_only_when_set_and_reads_back() {
        assert!(!sample_config().render().contains("image_step"));

        let meta = MasterMetadata::from_toml_str(SAMPLE_MASTER).unwrap();
        let config = ScoringConfigBuilder::from_metadata(&meta)
            .image_step(0.1)
            .build()
            .unwrap();
        let text = config.render();
        assert!(text.lines().any(|l| l == "image_step 0.1"));

        let parsed = ScoringConfig::parse(&text).unwrap();
        assert_eq!(parsed.image_step, Some(0.1));
        assert_eq!(parsed, config);
    }

    #[test]
    fn parse_accepts_hand_written_image_step() {
        let text = sample_config()
            .render()
            .replace("\nend", "\nimage_step 0.25\nend");
        let parsed = ScoringConfig::parse(&text).unwrap();
        assert_eq!(parsed.image_step, Some(0.25));
    }

    #[test]
    fn parse_requires_end_marker() {
        let text = sample_config().render().replace("\nend", "");
        assert_eq!(ScoringConfig::parse(&text), Err(ScoringConfigError::MissingEnd));
    }

    #[test]
    fn parse_rejects_unknown_and_duplicate_keys() {
        let text = format!("beamstop 3\n{}", sample_config().render());
        assert!(matches!(
            ScoringConfig::parse(&text),
            Err(ScoringConfigError::UnknownKey { line: 1, .. })
        ));

        let text = format!("nx 10\n{}", sample_config().render());
        assert!(matches!(
            ScoringConfig::parse(&text),
            Err(ScoringConfigError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn parse_reports_missing_required_key() {
        let text: String = sample_config()
            .render()
            .lines()
            .filter(|l| !l.starts_with("pixel_max"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(
            ScoringConfig::parse(&text),
            Err(ScoringConfigError::MissingParameter("pixel_max"))
        );
    }

    #[test]
    fn build_rejects_bad_geometry() {
        let meta = MasterMetadata::from_toml_str(SAMPLE_MASTER).unwrap();
        let err = ScoringConfigBuilder::from_metadata(&meta)
            .pixel_min(200_000)
            .build()
            .unwrap_err();
        assert!(matches!(err, ScoringConfigError::InvalidValue { .. }));

        let err = ScoringConfigBuilder::from_metadata(&meta)
            .roi(DetectorRoi {
                ix_min: 10,
                ix_max: 5000,
                iy_min: 0,
                iy_max: 10,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ScoringConfigError::InvalidValue { .. }));
    }
}
