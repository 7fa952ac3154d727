use super::defaults::DefaultsConfig;
use super::file::{
    FileConfig, FileFramePolicy, FileRoiConfig, FileRunConfig, FileSpotDetectionConfig,
};
use super::models::AppConfig;
use crate::cli::{ConfigArgs, RunArgs};
use crate::error::{CliError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use sxhit::core::io::metadata::MasterMetadata;
use sxhit::core::scoring::config::{DetectorRoi, ScoringConfig, ScoringConfigBuilder};
use sxhit::engine::config::{ConfigError, FramePolicy, RunConfigBuilder};
use sxhit::engine::error::EngineError;
use tracing::debug;

pub fn build_run_config(args: &RunArgs, meta: &MasterMetadata) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file_config(args.config.as_deref(), &args.set_values)?;
    let run_file = file_config.run.take().unwrap_or_default();

    let total = meta.total_frames().map_err(EngineError::from)?;
    let start = args.start.or(run_file.start).unwrap_or(defaults.start);
    let end = args.end.or(run_file.end).unwrap_or(total);
    if end > total {
        return Err(CliError::Argument(format!(
            "end frame {} exceeds the {} frame(s) recorded in the master file",
            end, total
        )));
    }

    let frame_policy = if args.abort_on_scoring_error {
        FramePolicy::Abort
    } else {
        run_file
            .on_scoring_error
            .map(Into::into)
            .unwrap_or(defaults.frame_policy)
    };

    let mut builder = RunConfigBuilder::new()
        .start(start)
        .end(end)
        .nproc(args.nproc.or(run_file.nproc).unwrap_or(defaults.nproc))
        .cutoff(args.cutoff.or(run_file.cutoff).unwrap_or(defaults.cutoff))
        .output_dir(
            args.output
                .clone()
                .or(run_file.output)
                .unwrap_or(defaults.output),
        )
        .frame_policy(frame_policy);
    if let Some(secs) = args.timeout.or(run_file.timeout_secs) {
        builder = builder.supervisor_timeout(Duration::from_secs(secs));
    }
    let run = builder.build().map_err(EngineError::from)?;

    let scoring = merge_scoring(meta, file_config.spot_detection, file_config.roi)?;
    debug!(?run, "Run configuration resolved.");

    Ok(AppConfig {
        master_path: args.master.clone(),
        mask_path: args.mask.clone(),
        run,
        scoring,
    })
}

pub fn build_scoring_config(args: &ConfigArgs, meta: &MasterMetadata) -> Result<ScoringConfig> {
    let file_config = load_file_config(args.config.as_deref(), &args.set_values)?;
    merge_scoring(meta, file_config.spot_detection, file_config.roi)
}

fn load_file_config(path: Option<&Path>, set_values: &[String]) -> Result<FileConfig> {
    let file_config = match path {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    apply_set_values(file_config, set_values)
}

fn merge_scoring(
    meta: &MasterMetadata,
    spot: Option<FileSpotDetectionConfig>,
    roi: Option<FileRoiConfig>,
) -> Result<ScoringConfig> {
    let mut builder = ScoringConfigBuilder::from_metadata(meta);

    let spot = spot.unwrap_or_default();
    if let Some(size) = spot.spot_size {
        builder = builder.spot_size(size);
    }
    if let Some(level) = spot.spot_level {
        builder = builder.spot_level(level);
    }
    if let Some(min) = spot.pixel_min {
        builder = builder.pixel_min(min);
    }
    if let Some(fraction) = spot.fraction_polarization {
        builder = builder.fraction_polarization(fraction);
    }

    // A partial ROI is completed with the detector edges.
    if let Some(roi) = roi {
        let x_edge = meta.detector.x_pixels.saturating_sub(1);
        let y_edge = meta.detector.y_pixels.saturating_sub(1);
        builder = builder.roi(DetectorRoi {
            ix_min: roi.ix_min.unwrap_or(0),
            ix_max: roi.ix_max.unwrap_or(x_edge),
            iy_min: roi.iy_min.unwrap_or(0),
            iy_max: roi.iy_max.unwrap_or(y_edge),
        });
    }

    let scoring = builder
        .build()
        .map_err(|e| EngineError::Config(ConfigError::from(e)))?;
    Ok(scoring)
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "run.start" => run_section(&mut config).start = Some(parse_set(key, value_str)?),
            "run.end" => run_section(&mut config).end = Some(parse_set(key, value_str)?),
            "run.cutoff" => run_section(&mut config).cutoff = Some(parse_set(key, value_str)?),
            "run.nproc" => run_section(&mut config).nproc = Some(parse_set(key, value_str)?),
            "run.output" => run_section(&mut config).output = Some(PathBuf::from(value_str)),
            "run.timeout-secs" => {
                run_section(&mut config).timeout_secs = Some(parse_set(key, value_str)?)
            }
            "run.on-scoring-error" => {
                let policy = match value_str {
                    "skip" => FileFramePolicy::Skip,
                    "abort" => FileFramePolicy::Abort,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Invalid value for {}: '{}' (expected 'skip' or 'abort')",
                            key, value_str
                        )));
                    }
                };
                run_section(&mut config).on_scoring_error = Some(policy);
            }
            "spot-detection.spot-size" => {
                spot_section(&mut config).spot_size = Some(parse_set(key, value_str)?)
            }
            "spot-detection.spot-level" => {
                spot_section(&mut config).spot_level = Some(parse_set(key, value_str)?)
            }
            "spot-detection.pixel-min" => {
                spot_section(&mut config).pixel_min = Some(parse_set(key, value_str)?)
            }
            "spot-detection.fraction-polarization" => {
                spot_section(&mut config).fraction_polarization =
                    Some(parse_set(key, value_str)?)
            }
            "roi.ix-min" => roi_section(&mut config).ix_min = Some(parse_set(key, value_str)?),
            "roi.ix-max" => roi_section(&mut config).ix_max = Some(parse_set(key, value_str)?),
            "roi.iy-min" => roi_section(&mut config).iy_min = Some(parse_set(key, value_str)?),
            "roi.iy-max" => roi_section(&mut config).iy_max = Some(parse_set(key, value_str)?),
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

fn run_section(config: &mut FileConfig) -> &mut FileRunConfig {
    config.run.get_or_insert_with(Default::default)
}

fn spot_section(config: &mut FileConfig) -> &mut FileSpotDetectionConfig {
    config.spot_detection.get_or_insert_with(Default::default)
}

fn roi_section(config: &mut FileConfig) -> &mut FileRoiConfig {
    config.roi.get_or_insert_with(Default::default)
}

fn parse_set<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}
