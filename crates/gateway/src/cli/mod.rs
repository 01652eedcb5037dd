pub mod config;
pub mod run;

use clap::{Parser, Subcommand};

/// ragchat: a retrieval-augmented chat gateway.
#[derive(Debug, Parser)]
#[command(name = "ragchat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Run one message through the pipeline and print the result.
    Run {
        /// The message to send.
        message: String,
        /// Session id (defaults to "cli:run").
        #[arg(long, default_value = "cli:run")]
        session: String,
        /// Output the full outcome as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `RC_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the
/// path that was used.
///
/// [`Config`]: rc_domain::config::Config
pub fn load_config() -> anyhow::Result<(rc_domain::config::Config, String)> {
    let config_path = std::env::var("RC_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

/// Missing files yield the default configuration.
pub fn load_config_from(config_path: &str) -> anyhow::Result<rc_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(rc_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}
