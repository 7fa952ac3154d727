//! In-memory doubles for the container and scoring boundaries.
//!
//! Frames built here carry their own global index in pixel 0, which lets the scripted
//! engine decide per frame whether to report a hit or fail.

use crate::core::io::container::{ContainerError, ContainerSource, FrameContainer};
use crate::core::models::frame::{Frame, PixelData, RawFrame, Shape};
use crate::core::scoring::config::{ScoringConfig, ScoringConfigBuilder};
use crate::core::scoring::engine::{FrameScore, ScoringContext, ScoringEngine, ScoringError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_SHAPE: Shape = Shape {
    width: 2,
    height: 1,
};

pub fn tagged_frame(frame_index: u64) -> RawFrame {
    RawFrame::new(TEST_SHAPE, PixelData::U16(vec![frame_index as u16, 0])).unwrap()
}

pub fn test_scoring_config() -> ScoringConfig {
    ScoringConfigBuilder::new()
        .nx(TEST_SHAPE.width as u32)
        .ny(TEST_SHAPE.height as u32)
        .pixel(0.075)
        .pixel_max(65534)
        .detector_distance(100.0)
        .wavelength(1.0)
        .orgx(1.0)
        .orgy(0.5)
        .exposure(0.01)
        .oscillation_range(0.1)
        .build()
        .unwrap()
}

/// Containers of `capacity` tagged frames covering frames `1..=total`.
pub struct MemorySource {
    capacity: u64,
    containers: BTreeMap<u64, Vec<RawFrame>>,
    stall: Option<(u64, Duration)>,
    opened: Mutex<Vec<u64>>,
}

impl MemorySource {
    pub fn sequential(capacity: u64, total: u64) -> Self {
        let mut containers: BTreeMap<u64, Vec<RawFrame>> = BTreeMap::new();
        for frame in 1..=total {
            containers
                .entry((frame - 1) / capacity)
                .or_default()
                .push(tagged_frame(frame));
        }
        Self {
            capacity,
            containers,
            stall: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn without_container(mut self, index: u64) -> Self {
        self.containers.remove(&index);
        self
    }

    /// Opening container `index` blocks for `delay` first.
    pub fn stalling_on(mut self, index: u64, delay: Duration) -> Self {
        self.stall = Some((index, delay));
        self
    }

    pub fn opened(&self) -> Vec<u64> {
        self.opened.lock().unwrap().clone()
    }
}

impl ContainerSource for MemorySource {
    type Container = MemoryContainer;

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn open(&self, index: u64) -> Result<MemoryContainer, ContainerError> {
        if let Some((stalled, delay)) = self.stall {
            if stalled == index {
                std::thread::sleep(delay);
            }
        }
        self.opened.lock().unwrap().push(index);
        let frames = self
            .containers
            .get(&index)
            .cloned()
            .ok_or_else(|| ContainerError::Missing {
                index,
                path: PathBuf::from(format!("memory://{}", index)),
            })?;
        Ok(MemoryContainer { index, frames })
    }
}

pub struct MemoryContainer {
    index: u64,
    frames: Vec<RawFrame>,
}

impl FrameContainer for MemoryContainer {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn read_frame(&mut self, local_offset: usize) -> Result<RawFrame, ContainerError> {
        self.frames
            .get(local_offset)
            .cloned()
            .ok_or(ContainerError::OffsetOutOfRange {
                index: self.index,
                offset: local_offset,
                len: self.frames.len(),
            })
    }
}

/// Scores 10.0 for the listed hit frames and 1.0 otherwise; fails on request.
#[derive(Default)]
pub struct ScriptedEngine {
    hits: Arc<BTreeSet<u64>>,
    failures: Arc<BTreeSet<u64>>,
    refuse_init: bool,
    initializations: AtomicUsize,
}

impl ScriptedEngine {
    pub fn with_hits(hits: &[u64]) -> Self {
        Self {
            hits: Arc::new(hits.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, frames: &[u64]) -> Self {
        self.failures = Arc::new(frames.iter().copied().collect());
        self
    }

    pub fn refusing_init(mut self) -> Self {
        self.refuse_init = true;
        self
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }
}

impl ScoringEngine for ScriptedEngine {
    type Context = ScriptedContext;

    fn initialize(&self, _config: &ScoringConfig) -> Result<ScriptedContext, ScoringError> {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        if self.refuse_init {
            return Err(ScoringError::Initialization("scripted refusal".to_string()));
        }
        Ok(ScriptedContext {
            hits: Arc::clone(&self.hits),
            failures: Arc::clone(&self.failures),
        })
    }
}

pub struct ScriptedContext {
    hits: Arc<BTreeSet<u64>>,
    failures: Arc<BTreeSet<u64>>,
}

impl ScoringContext for ScriptedContext {
    fn process(&mut self, frame: &Frame) -> Result<FrameScore, ScoringError> {
        let tag = u64::from(frame.pixels()[0]);
        if self.failures.contains(&tag) {
            return Err(ScoringError::Engine(format!("scripted failure on {}", tag)));
        }
        let score3 = if self.hits.contains(&tag) { 10.0 } else { 1.0 };
        Ok(FrameScore {
            spot_count: score3 as u32,
            score3,
            resolution_limit: 2.5,
            spots: Vec::new(),
        })
    }
}
