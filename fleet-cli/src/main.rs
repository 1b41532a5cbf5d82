use anyhow::Result;
use clap::Parser;
use fleet_cli::{AppContext, Cli, Settings, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    logging::init(&settings.log_level, &settings.log_dir)?;

    let ctx = AppContext::from_settings(settings).await?;
    let mut stdout = std::io::stdout().lock();
    fleet_cli::run(&cli.command, &ctx, &mut stdout).await
}
