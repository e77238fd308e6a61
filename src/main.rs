//! Mushroom classifier entry point

use clap::Parser;
use mushroom_classifier::cli::{cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mushroom_classifier=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, config, grids, tracking_dir } => {
            cmd_train(&data, config.as_deref(), grids.as_deref(), tracking_dir.as_deref())?;
        }
        Commands::Predict { record, config } => {
            cmd_predict(record, config.as_deref())?;
        }
        Commands::Serve { port, host, config } => {
            cmd_serve(&host, port, config.as_deref()).await?;
        }
    }

    Ok(())
}
