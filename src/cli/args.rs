use clap::Parser;
use std::path::PathBuf;

/// Modbus TCP collector agent for a single device with primary/backup failover
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "modbus-collector-agent", version, about)]
pub struct CliArgs {
    /// Device config: path to a JSON file, or the JSON document itself
    #[arg(long)]
    pub config: Option<String>,

    /// Points config file path [default: plc_points.json]
    #[arg(long)]
    pub points: Option<String>,

    /// Push gateway URL
    #[arg(long = "push-gateway")]
    pub push_gateway: Option<String>,

    /// Local metrics HTTP port, 0 disables the exporter
    #[arg(long)]
    pub port: Option<u16>,

    /// Poll interval in seconds [default: 5]
    #[arg(long)]
    pub interval: Option<u64>,

    /// Optional TOML settings file; command line flags take precedence
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Log level filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Run a single poll cycle, print the report and exit
    #[arg(long)]
    pub once: bool,

    /// Load and validate configuration, then exit
    #[arg(long)]
    pub check_config: bool,
}
