use std::path::PathBuf;

use bb_core::config::DetectorConfig;
use clap::Parser;

/// BugBeats: rodent acoustic detector server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file. Missing file = built-in defaults.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Listen port (overrides config and $PORT).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address (overrides config and $BUGBEATS_HOST).
    #[arg(long)]
    pub host: Option<String>,

    /// Model artifact (overrides config and $BUGBEATS_MODEL_PATH).
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Classify one audio file, print the JSON response and exit.
    #[arg(long, value_name = "FILE")]
    pub classify: Option<PathBuf>,

    /// With --classify: write the resampled clip to this WAV file.
    #[arg(long, value_name = "WAV", requires = "classify")]
    pub save_clip: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Apply command-line overrides, the last configuration layer.
    pub fn apply_overrides(&self, config: &mut DetectorConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(model) = &self.model {
            config.model.path.clone_from(model);
        }
    }
}
