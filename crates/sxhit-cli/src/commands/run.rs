use crate::cli::RunArgs;
use crate::config::build_run_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use std::path::Path;
use std::sync::Arc;
use sxhit::{
    core::io::{container::RawContainerDir, mask::resolve_mask, metadata::MasterMetadata},
    core::models::frame::Shape,
    core::scoring::threshold::ThresholdEngine,
    engine::{cancel::CancellationToken, error::EngineError, progress::ProgressReporter},
    workflows::hitfind::{self, RunInputs},
};
use tracing::{info, warn};

pub async fn run(args: RunArgs, cancel: CancellationToken) -> Result<()> {
    run_with_reporter(args, cancel, || {
        let handler = CliProgressHandler::new();
        ProgressReporter::with_callback(handler.get_callback())
    })
    .await
}

async fn run_with_reporter<F>(args: RunArgs, cancel: CancellationToken, reporter: F) -> Result<()>
where
    F: FnOnce() -> ProgressReporter<'static>,
{
    info!("Loading master metadata from {:?}", &args.master);
    let meta = MasterMetadata::load(&args.master).map_err(EngineError::from)?;

    info!("Merging configuration from file and CLI arguments...");
    let app = build_run_config(&args, &meta)?;

    let source_dir = containing_dir(&app.master_path);
    let source = RawContainerDir::open(source_dir).map_err(EngineError::from)?;
    let expected = Shape::new(
        meta.detector.x_pixels as usize,
        meta.detector.y_pixels as usize,
    );
    if source.shape() != expected {
        return Err(EngineError::ShapeMismatch {
            expected,
            found: source.shape(),
        }
        .into());
    }

    let mask = resolve_mask(app.mask_path.as_deref(), source_dir).map_err(EngineError::from)?;
    if mask.is_none() {
        warn!("No detector pixel mask in use.");
    }

    let inputs = RunInputs {
        source: Arc::new(source),
        engine: Arc::new(ThresholdEngine),
        scoring: app.scoring,
        mask,
    };
    let reporter = Arc::new(reporter());

    println!(
        "Scoring frames {} with {} worker(s)...",
        app.run.range, app.run.nproc
    );
    info!("Invoking the core hit-finding workflow...");
    let report =
        tokio::task::block_in_place(|| hitfind::run(inputs, &app.run, reporter, &cancel))?;

    println!("{}", report.summary_line());
    for line in report.failure_lines() {
        println!("{}", line);
    }
    println!("Results written to: {}", app.run.output_dir.display());

    report.ensure_complete()?;
    Ok(())
}

fn containing_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}
