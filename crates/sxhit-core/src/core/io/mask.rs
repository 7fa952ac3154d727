use super::raw::{RawError, RawFile};
use crate::core::models::mask::Mask;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// File name of the detector pixel mask looked up next to the master file.
pub const DEFAULT_MASK_FILE: &str = "pixel_mask.raw";

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("Failed to read mask '{path}': {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: RawError,
    },
    #[error("Mask file '{path}' contains no frames", path = path.display())]
    Empty { path: PathBuf },
}

/// Loads a mask from a raw file. Only the first frame is used.
pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<Mask, MaskError> {
    let path = path.as_ref();
    let read_err = |source: RawError| MaskError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = RawFile::open(path).map_err(read_err)?;
    if file.header().frame_count == 0 {
        return Err(MaskError::Empty {
            path: path.to_path_buf(),
        });
    }
    let frame = file.read_frame(0).map_err(read_err)?;
    let shape = frame.shape();
    let values = frame.into_data().to_u32_vec();

    let mask = Mask::from_values(shape, &values).ok_or_else(|| {
        read_err(RawError::InconsistentFrame { index: 0 })
    })?;
    info!(
        path = %path.display(),
        shape = %shape,
        excluded = mask.excluded_count(),
        "Loaded defect mask."
    );
    Ok(mask)
}

/// Picks the mask for a run: an explicit path wins, otherwise `pixel_mask.raw` in
/// `source_dir` is used when present, otherwise the run is unmasked.
pub fn resolve_mask(explicit: Option<&Path>, source_dir: &Path) -> Result<Option<Mask>, MaskError> {
    if let Some(path) = explicit {
        return load_mask(path).map(Some);
    }
    let fallback = source_dir.join(DEFAULT_MASK_FILE);
    if fallback.is_file() {
        debug!("Using detector pixel mask found at {:?}", fallback);
        return load_mask(&fallback).map(Some);
    }
    debug!("No mask given and none found in {:?}; running unmasked.", source_dir);
    Ok(None)
}
