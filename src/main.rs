mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    bumpline::output::print_banner();

    let cli = Cli::parse();
    info!("Starting bumpline");
    cli.execute().await?;

    Ok(())
}
