use anyhow::Context;
use harvester::PostOutcome;
use threadkeeper::{init_tracing, Pipeline};
use threadkeeper_core::AppConfig;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .await
        .context("failed to load configuration")?;
    let pipeline = Pipeline::from_config(config).context("failed to set up the pipeline")?;

    let captured = pipeline.run_realtime().await;
    if captured.is_empty() {
        info!("No open posts to capture");
    }
    for (category, date, outcome) in captured {
        match outcome {
            PostOutcome::Persisted { comments, path, .. } => {
                info!("{} {}: {} comments in {}", category, date, comments, path.display())
            }
            PostOutcome::Failed {
                error_code,
                message,
            } => error!("{} {}: {} ({})", category, date, message, error_code),
            other => info!("{} {}: {:?}", category, date, other),
        }
    }
    Ok(())
}
