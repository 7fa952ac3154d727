use std::path::PathBuf;
use sxhit::engine::config::FramePolicy;

pub struct DefaultsConfig {
    pub start: u64,
    pub cutoff: f64,
    pub nproc: usize,
    pub output: PathBuf,
    pub frame_policy: FramePolicy,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            start: 1,
            cutoff: 5.0,
            nproc: 1,
            output: PathBuf::from("sxhit_res"),
            frame_policy: FramePolicy::Skip,
        }
    }
}
