use super::raw::{RawError, RawFile};
use crate::core::models::frame::{RawFrame, Shape};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Container {index} is missing (expected '{path}')", path = path.display())]
    Missing { index: u64, path: PathBuf },

    #[error("Failed to read container {index} ('{path}'): {source}", path = path.display())]
    Read {
        index: u64,
        path: PathBuf,
        #[source]
        source: RawError,
    },

    #[error("Container {index} holds {len} frame(s); local offset {offset} is out of range")]
    OffsetOutOfRange { index: u64, offset: usize, len: usize },

    #[error("Container {index} has shape {found}, expected {expected}")]
    ShapeDrift {
        index: u64,
        expected: Shape,
        found: Shape,
    },
}

/// One opened container: a fixed-capacity run of consecutive frames.
///
/// Dropping the value releases the underlying file.
pub trait FrameContainer {
    /// Frames actually stored; the last container of a run may be short.
    fn len(&self) -> usize;

    fn read_frame(&mut self, local_offset: usize) -> Result<RawFrame, ContainerError>;
}

/// An ordered set of containers addressable by sequential index.
///
/// Sources are shared read-only between workers; each worker opens its own
/// containers, so an opened container is never shared.
pub trait ContainerSource: Send + Sync {
    type Container: FrameContainer;

    /// Frames per container, constant for a run.
    fn capacity(&self) -> u64;

    fn open(&self, index: u64) -> Result<Self::Container, ContainerError>;
}

/// Containers stored as `data_000001.raw`, `data_000002.raw`, ... in one directory.
#[derive(Debug, Clone)]
pub struct RawContainerDir {
    dir: PathBuf,
    capacity: u64,
    shape: Shape,
}

impl RawContainerDir {
    /// Opens the directory, taking the capacity and frame shape from the first container.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, ContainerError> {
        let dir = dir.as_ref().to_path_buf();
        let first = open_raw(&dir, 0)?;
        let header = *first.header();
        Ok(Self {
            dir,
            capacity: header.frame_count as u64,
            shape: header.shape,
        })
    }

    pub fn container_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(format!("data_{:06}.raw", index + 1))
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }
}

fn open_raw(dir: &Path, index: u64) -> Result<RawFile, ContainerError> {
    let path = RawContainerDir::container_path(dir, index);
    RawFile::open(&path).map_err(|source| match source {
        RawError::Io(ref e) if e.kind() == io::ErrorKind::NotFound => {
            ContainerError::Missing { index, path }
        }
        source => ContainerError::Read {
            index,
            path,
            source,
        },
    })
}

impl ContainerSource for RawContainerDir {
    type Container = RawContainer;

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn open(&self, index: u64) -> Result<RawContainer, ContainerError> {
        let file = open_raw(&self.dir, index)?;
        let found = file.header().shape;
        if found != self.shape {
            return Err(ContainerError::ShapeDrift {
                index,
                expected: self.shape,
                found,
            });
        }
        Ok(RawContainer { index, file })
    }
}

#[derive(Debug)]
pub struct RawContainer {
    index: u64,
    file: RawFile,
}

impl FrameContainer for RawContainer {
    fn len(&self) -> usize {
        self.file.header().frame_count
    }

    fn read_frame(&mut self, local_offset: usize) -> Result<RawFrame, ContainerError> {
        let len = self.len();
        if local_offset >= len {
            return Err(ContainerError::OffsetOutOfRange {
                index: self.index,
                offset: local_offset,
                len,
            });
        }
        self.file
            .read_frame(local_offset)
            .map_err(|source| ContainerError::Read {
                index: self.index,
                path: self.file.path().to_path_buf(),
                source,
            })
    }
}
