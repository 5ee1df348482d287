pub mod cli;
pub mod order_config;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "reagent-orders")]
#[command(about = "Convert laboratory test demand sheets into warehouse purchase orders")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "orders.toml")]
    pub config: String,

    /// Override run.output_dir from the config
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Only process these facility ids (repeatable)
    #[arg(long = "facility")]
    pub facilities: Vec<String>,

    /// Resolve orders and log them without writing any file
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}
