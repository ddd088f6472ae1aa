use anyhow::Result;
use bb_core::config::DetectorConfig;
use bb_server::cli::Cli;
use bb_server::{app, offline};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. CLI
    let cli = Cli::parse();

    // 2. Logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    // 3. Config: file < environment < flags
    let mut config = resolve_config(&cli)?;
    config.apply_process_env();
    cli.apply_overrides(&mut config);
    config.validate()?;

    // 4. Offline classification
    if let Some(file) = &cli.classify {
        let body = offline::classify_file(&config, file, cli.save_clip.as_deref())?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    // 5. Server; flags are re-applied on every config reload
    let config_path = cli.config.clone();
    app::serve(config, &config_path, move |c: &mut DetectorConfig| {
        cli.apply_overrides(c);
    })
    .await
}

fn resolve_config(cli: &Cli) -> Result<DetectorConfig> {
    if cli.config.exists() {
        bb_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config not found: {}. Using defaults.",
            cli.config.display()
        );
        Ok(DetectorConfig::default())
    }
}
