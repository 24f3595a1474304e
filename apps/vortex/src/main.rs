use clap::Parser;
use vortex_shell_core::telemetry::logging;
use vortex_shell_core::terminal::{app, cli::Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(&cli.logging.to_config())?;
    app::run(cli).await?;
    Ok(())
}
