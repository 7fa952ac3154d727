use std::path::PathBuf;
use sxhit::core::scoring::config::ScoringConfig;
use sxhit::engine::config::RunConfig;

pub struct AppConfig {
    pub master_path: PathBuf,
    pub mask_path: Option<PathBuf>,
    pub run: RunConfig,
    pub scoring: ScoringConfig,
}
