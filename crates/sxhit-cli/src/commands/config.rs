use crate::cli::ConfigArgs;
use crate::config::build_scoring_config;
use crate::error::Result;
use sxhit::core::io::metadata::MasterMetadata;
use sxhit::engine::error::EngineError;
use tracing::info;

pub async fn run(args: ConfigArgs) -> Result<()> {
    info!("Loading master metadata from {:?}", &args.master);
    let meta = MasterMetadata::load(&args.master).map_err(EngineError::from)?;

    let scoring = build_scoring_config(&args, &meta)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    scoring.write_to_path(&args.output)?;

    info!(path = %args.output.display(), "Scoring configuration written.");
    println!(
        "Scoring configuration written to: {}",
        args.output.display()
    );
    Ok(())
}
