use clap::Parser;
use color_eyre::Result;
use std::env;
use std::path::Path;
use studylog::{Config, Profile, cli::{self, Cli, Commands}};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STUDYLOG_LOG")
        .unwrap_or_else(|_| EnvFilter::new("studylog=info,warn"));

    let format = env::var("STUDYLOG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // Logs go to stderr so command output stays pipeable
    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(Path::new(path))?,
        None => Config::load_with_profile(profile)?,
    };
    config.apply_env_overrides();

    let ctx = cli::Context::new(config, cli.offline);

    match cli.command {
        Commands::Day { action } => cli::handle_day(action, &ctx).await?,
        Commands::Calendar { month } => cli::handle_calendar(month, &ctx).await?,
        Commands::Task { action } => cli::handle_task(action, &ctx)?,
        Commands::Entry { action } => cli::handle_entry(action, &ctx)?,
        Commands::Video { action } => cli::handle_video(action, &ctx)?,
        Commands::Shot { action } => cli::handle_shot(action, &ctx)?,
        Commands::Export { target } => cli::handle_export(target, &ctx).await?,
        Commands::Sync { action } => cli::handle_sync(action, &ctx).await?,
    }

    Ok(())
}
