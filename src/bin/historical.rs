use anyhow::Context;
use threadkeeper::{init_tracing, Pipeline};
use threadkeeper_core::AppConfig;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .await
        .context("failed to load configuration")?;
    info!("Writing comment files to {}", config.output_dir.display());

    let pipeline = Pipeline::from_config(config).context("failed to set up the pipeline")?;
    let today = chrono::Local::now().date_naive();
    let reports = pipeline
        .run_historical(today)
        .await
        .context("historical harvest aborted")?;

    for report in &reports {
        info!(
            "{}: {} persisted, {} already stored, {} still open, {} failed",
            report.category,
            report.persisted(),
            report.skipped(),
            report.deferred(),
            report.failed()
        );
    }
    Ok(())
}
