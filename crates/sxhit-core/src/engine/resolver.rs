use super::config::ConfigError;
use crate::core::models::range::FrameRange;
use std::num::NonZeroU64;

/// Where a global frame lives: 0-based container index and offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLocation {
    pub container_index: u64,
    pub local_offset: u64,
}

/// The slice of one container a contiguous frame range touches, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSpan {
    pub container_index: u64,
    pub local_start: u64,
    pub local_end: u64,
}

impl ContainerSpan {
    pub fn offsets(&self) -> std::ops::RangeInclusive<u64> {
        self.local_start..=self.local_end
    }

    pub fn len(&self) -> u64 {
        self.local_end - self.local_start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.local_end < self.local_start
    }
}

/// Global frame index arithmetic for containers of a fixed capacity.
///
/// Pure: nothing here touches a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerLayout {
    capacity: NonZeroU64,
}

impl ContainerLayout {
    pub fn new(capacity: u64) -> Result<Self, ConfigError> {
        NonZeroU64::new(capacity)
            .map(|capacity| Self { capacity })
            .ok_or_else(|| ConfigError::Invalid {
                param: "container capacity",
                reason: "containers must hold at least one frame".to_string(),
            })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity.get()
    }

    /// Maps a 1-based global frame index to its container. Index 0 has no location.
    pub fn locate(&self, frame_index: u64) -> Option<FrameLocation> {
        let zero_based = frame_index.checked_sub(1)?;
        Some(FrameLocation {
            container_index: zero_based / self.capacity(),
            local_offset: zero_based % self.capacity(),
        })
    }

    /// Inverse of [`locate`](Self::locate).
    pub fn global_index(&self, container_index: u64, local_offset: u64) -> u64 {
        container_index * self.capacity() + local_offset + 1
    }

    /// Containers touched by `range`, in ascending order, each with the offsets used.
    pub fn spans(&self, range: FrameRange) -> Vec<ContainerSpan> {
        let mut spans = Vec::new();
        let mut next = range.start();
        while next <= range.end() {
            let Some(loc) = self.locate(next) else {
                break;
            };
            let container_last = self.global_index(loc.container_index, self.capacity() - 1);
            let last = container_last.min(range.end());
            spans.push(ContainerSpan {
                container_index: loc.container_index,
                local_start: loc.local_offset,
                local_end: loc.local_offset + (last - next),
            });
            next = last + 1;
        }
        spans
    }
}
