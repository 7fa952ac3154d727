//! A small reference engine: counts compact groups of bright pixels.
//!
//! It is not a diffraction-quality estimator. It exists so the driver can run end to
//! end without the native engine, and its behaviour is simple enough to reason about
//! in tests: the score is the number of spots found.

use super::config::ScoringConfig;
use super::engine::{FrameScore, ScoringContext, ScoringEngine, ScoringError, Spot};
use crate::core::models::frame::{Frame, Shape};
use tracing::debug;

/// Normalized intensities at or above this value are saturated, masked or unreliable.
const UNUSABLE_FROM: u16 = 65534;
const RESOLUTION_QUANTILE: f64 = 0.9;

#[derive(Debug, Default, Clone, Copy)]
pub struct ThresholdEngine;

impl ScoringEngine for ThresholdEngine {
    type Context = ThresholdContext;

    fn initialize(&self, config: &ScoringConfig) -> Result<ThresholdContext, ScoringError> {
        ThresholdContext::new(config)
    }
}

#[derive(Debug)]
pub struct ThresholdContext {
    shape: Shape,
    x_range: (usize, usize),
    y_range: (usize, usize),
    pixel_min: u16,
    spot_level: f64,
    spot_size: usize,
    orgx: f64,
    orgy: f64,
    /// d-spacing (Å) indexed by integer pixel distance from the beam centre.
    resolution_by_radius: Vec<f64>,
    visited: Vec<bool>,
    stack: Vec<usize>,
}

impl ThresholdContext {
    fn new(config: &ScoringConfig) -> Result<Self, ScoringError> {
        let shape = Shape::new(config.nx as usize, config.ny as usize);
        if shape.pixel_count() == 0 {
            return Err(ScoringError::Initialization(
                "detector has no pixels".to_string(),
            ));
        }

        let roi = config.roi;
        let (x_range, y_range) = if roi.is_full_detector() {
            ((0, shape.width - 1), (0, shape.height - 1))
        } else {
            (
                (roi.ix_min as usize, roi.ix_max as usize),
                (roi.iy_min as usize, roi.iy_max as usize),
            )
        };

        let resolution_by_radius = build_resolution_table(config, shape);
        debug!(
            shape = %shape,
            radii = resolution_by_radius.len(),
            "Reference scoring context initialized."
        );

        Ok(Self {
            shape,
            x_range,
            y_range,
            pixel_min: u16::try_from(config.pixel_min).unwrap_or(u16::MAX),
            spot_level: f64::from(config.spot_level),
            spot_size: config.spot_size as usize,
            orgx: config.orgx,
            orgy: config.orgy,
            resolution_by_radius,
            visited: vec![false; shape.pixel_count()],
            stack: Vec::new(),
        })
    }

    #[inline]
    fn in_roi(&self, x: usize, y: usize) -> bool {
        (self.x_range.0..=self.x_range.1).contains(&x)
            && (self.y_range.0..=self.y_range.1).contains(&y)
    }

    #[inline]
    fn usable(&self, value: u16) -> bool {
        value >= self.pixel_min && value < UNUSABLE_FROM
    }

    /// Mean plus `spot_level` Poisson standard deviations of the usable ROI pixels.
    fn threshold(&self, pixels: &[u16]) -> f64 {
        let (mut sum, mut count) = (0.0f64, 0usize);
        for y in self.y_range.0..=self.y_range.1 {
            let row = &pixels[y * self.shape.width..(y + 1) * self.shape.width];
            for &value in &row[self.x_range.0..=self.x_range.1] {
                if self.usable(value) {
                    sum += f64::from(value);
                    count += 1;
                }
            }
        }
        let mean = if count == 0 { 0.0 } else { sum / count as f64 };
        (mean + self.spot_level * mean.sqrt()).max(1.0)
    }

    fn resolution_at(&self, x: f64, y: f64) -> f64 {
        let radius = ((x - self.orgx).powi(2) + (y - self.orgy).powi(2)).sqrt();
        let idx = (radius.round() as usize).min(self.resolution_by_radius.len() - 1);
        self.resolution_by_radius[idx]
    }

    /// Flood-fills the bright region containing `seed`; returns its size and the spot.
    fn grow_spot(&mut self, pixels: &[u16], seed: usize, threshold: f64) -> (usize, Spot) {
        let width = self.shape.width;
        let (mut size, mut sx, mut sy, mut total) = (0usize, 0.0f64, 0.0f64, 0.0f64);
        self.stack.clear();
        self.stack.push(seed);
        self.visited[seed] = true;

        while let Some(idx) = self.stack.pop() {
            let (x, y) = (idx % width, idx / width);
            size += 1;
            sx += x as f64;
            sy += y as f64;
            total += f64::from(pixels[idx]);

            let neighbours = [
                (x > 0).then(|| idx - 1),
                (x + 1 < width).then(|| idx + 1),
                (y > 0).then(|| idx - width),
                (y + 1 < self.shape.height).then(|| idx + width),
            ];
            for next in neighbours.into_iter().flatten() {
                let (nx, ny) = (next % width, next / width);
                if self.visited[next] || !self.in_roi(nx, ny) {
                    continue;
                }
                let value = pixels[next];
                if self.usable(value) && f64::from(value) > threshold {
                    self.visited[next] = true;
                    self.stack.push(next);
                }
            }
        }
        let spot = Spot {
            x: sx / size as f64,
            y: sy / size as f64,
            intensity: total,
        };
        (size, spot)
    }
}

impl ScoringContext for ThresholdContext {
    fn process(&mut self, frame: &Frame) -> Result<FrameScore, ScoringError> {
        if frame.shape() != self.shape {
            return Err(ScoringError::Rejected(format!(
                "frame shape {} does not match configured detector {}",
                frame.shape(),
                self.shape
            )));
        }
        let pixels = frame.pixels();
        let threshold = self.threshold(pixels);
        self.visited.iter_mut().for_each(|v| *v = false);

        let mut spots = Vec::new();
        let mut resolutions = Vec::new();
        for y in self.y_range.0..=self.y_range.1 {
            for x in self.x_range.0..=self.x_range.1 {
                let idx = y * self.shape.width + x;
                let value = pixels[idx];
                if self.visited[idx] || !self.usable(value) || f64::from(value) <= threshold {
                    continue;
                }
                let (size, spot) = self.grow_spot(pixels, idx, threshold);
                if size >= self.spot_size {
                    resolutions.push(self.resolution_at(spot.x, spot.y));
                    spots.push(spot);
                }
            }
        }

        Ok(FrameScore {
            spot_count: resolutions.len() as u32,
            score3: resolutions.len() as f64,
            resolution_limit: resolution_quantile(&mut resolutions),
            spots,
        })
    }
}

fn build_resolution_table(config: &ScoringConfig, shape: Shape) -> Vec<f64> {
    let corners = [
        (0.0, 0.0),
        (shape.width as f64, 0.0),
        (0.0, shape.height as f64),
        (shape.width as f64, shape.height as f64),
    ];
    let max_radius = corners
        .iter()
        .map(|(x, y)| ((x - config.orgx).powi(2) + (y - config.orgy).powi(2)).sqrt())
        .fold(0.0f64, f64::max)
        .ceil() as usize;

    (0..=max_radius)
        .map(|r| {
            let two_theta = (r as f64 * config.pixel / config.detector_distance).atan();
            let sin_theta = (two_theta / 2.0).sin();
            if sin_theta > 0.0 {
                config.wavelength / (2.0 * sin_theta)
            } else {
                f64::INFINITY
            }
        })
        .collect()
}

/// The d-spacing that 90% of the spots reach or exceed; 0 when there are no spots.
fn resolution_quantile(resolutions: &mut [f64]) -> f64 {
    if resolutions.is_empty() {
        return 0.0;
    }
    resolutions.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((resolutions.len() as f64 * RESOLUTION_QUANTILE).ceil() as usize)
        .saturating_sub(1)
        .min(resolutions.len() - 1);
    resolutions[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scoring::config::ScoringConfigBuilder;

    fn small_config(spot_size: u32) -> ScoringConfig {
        ScoringConfigBuilder::new()
            .nx(16)
            .ny(16)
            .pixel(0.075)
            .pixel_max(65534)
            .detector_distance(100.0)
            .wavelength(1.0)
            .orgx(8.0)
            .orgy(8.0)
            .exposure(0.01)
            .oscillation_range(0.1)
            .spot_size(spot_size)
            .spot_level(3)
            .build()
            .unwrap()
    }

    fn frame_with_spots(spots: &[(usize, usize)], value: u16) -> Frame {
        let shape = Shape::new(16, 16);
        let mut pixels = vec![1u16; shape.pixel_count()];
        for &(x, y) in spots {
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                pixels[(y + dy) * 16 + x + dx] = value;
            }
        }
        Frame::new(shape, pixels).unwrap()
    }

    #[test]
    fn counts_separate_bright_groups() {
        let mut ctx = ThresholdEngine.initialize(&small_config(2)).unwrap();
        let frame = frame_with_spots(&[(1, 1), (10, 2), (4, 12)], 500);

        let score = ctx.process(&frame).unwrap();
        assert_eq!(score.spot_count, 3);
        assert_eq!(score.score3, 3.0);
        assert!(score.resolution_limit > 0.0);
    }

    #[test]
    fn reports_centroid_and_summed_intensity_of_each_spot() {
        let mut ctx = ThresholdEngine.initialize(&small_config(2)).unwrap();
        let score = ctx.process(&frame_with_spots(&[(1, 1), (10, 2)], 500)).unwrap();

        assert_eq!(score.spots.len(), score.spot_count as usize);
        assert_eq!(
            score.spots[0],
            Spot {
                x: 1.5,
                y: 1.5,
                intensity: 2000.0
            }
        );
        assert_eq!((score.spots[1].x, score.spots[1].y), (10.5, 2.5));
    }

    #[test]
    fn blank_frame_scores_zero() {
        let mut ctx = ThresholdEngine.initialize(&small_config(2)).unwrap();
        let score = ctx.process(&frame_with_spots(&[], 0)).unwrap();
        assert_eq!(score.spot_count, 0);
        assert_eq!(score.resolution_limit, 0.0);
        assert!(score.spots.is_empty());
    }

    #[test]
    fn saturated_pixels_never_form_spots() {
        let mut ctx = ThresholdEngine.initialize(&small_config(1)).unwrap();
        let score = ctx.process(&frame_with_spots(&[(3, 3)], 65535)).unwrap();
        assert_eq!(score.spot_count, 0);
    }

    #[test]
    fn groups_smaller_than_spot_size_are_ignored() {
        let mut ctx = ThresholdEngine.initialize(&small_config(5)).unwrap();
        let score = ctx.process(&frame_with_spots(&[(3, 3)], 500)).unwrap();
        assert_eq!(score.spot_count, 0);
    }

    #[test]
    fn context_is_reusable_across_frames() {
        let mut ctx = ThresholdEngine.initialize(&small_config(2)).unwrap();
        let hit = frame_with_spots(&[(1, 1), (10, 10)], 400);
        assert_eq!(ctx.process(&hit).unwrap().spot_count, 2);
        assert_eq!(ctx.process(&hit).unwrap().spot_count, 2);
    }

    #[test]
    fn rejects_frames_of_another_shape() {
        let mut ctx = ThresholdEngine.initialize(&small_config(2)).unwrap();
        let frame = Frame::new(Shape::new(4, 4), vec![0; 16]).unwrap();
        assert!(matches!(ctx.process(&frame), Err(ScoringError::Rejected(_))));
    }

    #[test]
    fn resolution_quantile_picks_the_ninety_percent_point() {
        let mut values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(resolution_quantile(&mut values), 2.0);
        let mut values = vec![4.0, 2.0];
        assert_eq!(resolution_quantile(&mut values), 2.0);
    }
}
