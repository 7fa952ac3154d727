use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RangeError {
    #[error("Frame indices are 1-based; a range cannot start at 0")]
    ZeroStart,
    #[error("Invalid frame range: start {start} is greater than end {end}")]
    Inverted { start: u64, end: u64 },
}

/// An inclusive, 1-based range of global frame indices.
///
/// A `FrameRange` is never empty: construction rejects `start > end`. Places that
/// need to express "no frames" (for example an idle worker) use `Option<FrameRange>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRange {
    start: u64,
    end: u64,
}

impl FrameRange {
    pub fn new(start: u64, end: u64) -> Result<Self, RangeError> {
        if start == 0 {
            return Err(RangeError::ZeroStart);
        }
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of frames in the range. Always at least one.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    #[inline]
    pub fn contains(&self, frame_index: u64) -> bool {
        (self.start..=self.end).contains(&frame_index)
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
