#![warn(clippy::all, rust_2018_idioms)]

use anyhow::Result;
use clap::Parser;
use stackup::app::cli::{self, Cli};
use stackup::app::settings::Settings;
use tracing_subscriber::prelude::*;

const DEFAULT_LOG_FILTER: &str = "stackup=info,aws_config=warn,aws_smithy_runtime=warn,hyper=warn";

fn init_logging(debug: bool) -> Result<()> {
    // RUST_LOG replaces the default filter; --debug applies on top of either
    let directives = std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let mut filter = tracing_subscriber::EnvFilter::builder().parse(directives)?;
    if debug {
        filter = filter.add_directive("stackup=debug".parse()?);
    }

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );
    tracing::subscriber::set_global_default(subscriber)?;

    // reqwest logs through the log crate
    tracing_log::LogTracer::init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug)?;

    let mut settings = Settings::load()?;
    cli.apply_to(&mut settings);
    tracing::debug!("Effective settings: {:?}", settings);

    if let Err(err) = cli::run(cli, settings).await {
        eprintln!("ERROR: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
