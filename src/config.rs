// Configuration management for policy-route-sync
// Supports CLI arguments, a TOML config file, and environment variables

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Defaults for the `single` subcommand
pub const DEFAULT_TABLE_NAME: &str = "default";
pub const DEFAULT_NEXT_HOP: &str = "10.8.0.1";
pub const DEFAULT_TARGET_TABLE: u32 = 100;
pub const DEFAULT_RULE_PRIORITY: u32 = 100;
pub const DEFAULT_SLEEP_TIME: &str = "30s";

const DEFAULT_CONFIG_PATHS: &[&str] = &["config.toml", "policy-route-sync.toml"];

/// policy-route-sync - keep source policy rules in step with routes via a next-hop
#[derive(Parser, Debug, Clone)]
#[command(name = "policy-route-sync")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, env = "PRS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, env = "PRS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Run a single reconciliation cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Log rule changes instead of applying them
    #[arg(long, env = "PRS_DRY_RUN")]
    pub dry_run: bool,

    /// The iproute2 `ip` binary to run
    #[arg(long, env = "PRS_IP_COMMAND")]
    pub ip_command: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Reconcile one table definition given on the command line
    Single(SingleArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SingleArgs {
    /// Next-hop whose routes should get rules
    #[arg(long, default_value = DEFAULT_NEXT_HOP)]
    pub next_hop: String,

    /// Rule table the rules point at
    #[arg(long, default_value_t = DEFAULT_TARGET_TABLE)]
    pub table: u32,

    /// Priority given to created rules
    #[arg(long, default_value_t = DEFAULT_RULE_PRIORITY)]
    pub priority: u32,

    /// Time between reconciliation cycles
    #[arg(long, default_value = DEFAULT_SLEEP_TIME)]
    pub interval: String,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Time between reconciliation cycles, e.g. "30s" or "1m30s"
    pub sleep_time: String,

    /// iproute2 binary
    #[serde(default)]
    pub ip_command: Option<String>,

    /// Log rule changes instead of applying them
    #[serde(default)]
    pub dry_run: bool,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Table definitions by name
    #[serde(default)]
    pub tables: BTreeMap<String, TableConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub search_next_hop: String,
    pub target_table: u32,
    pub rule_priority: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// One validated table definition, reconciled independently of the others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub search_next_hop: Ipv4Addr,
    pub target_table: u32,
    pub rule_priority: u32,
}

impl TableDefinition {
    pub fn new(
        name: &str,
        search_next_hop: &str,
        target_table: u32,
        rule_priority: u32,
    ) -> anyhow::Result<Self> {
        let search_next_hop = search_next_hop
            .parse::<Ipv4Addr>()
            .map_err(|_| anyhow!("Invalid search_next_hop IP address in table '{}'", name))?;

        if target_table == 0 {
            bail!("Invalid target_table 0 in table '{}'", name);
        }

        Ok(TableDefinition {
            name: name.to_string(),
            search_next_hop,
            target_table,
            rule_priority,
        })
    }
}

/// Where the table definitions came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    CommandLine,
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub source: ConfigSource,
    pub sleep_time: Duration,
    pub tables: Vec<TableDefinition>,
    pub log_level: Level,
    pub ip_command: String,
    pub dry_run: bool,
    pub once: bool,
}

impl Config {
    /// Load configuration from all sources (CLI args, config file, defaults)
    /// Priority: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> anyhow::Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(cli_args: CliArgs) -> anyhow::Result<Self> {
        match &cli_args.command {
            Some(CliCommand::Single(single)) => Self::single(&cli_args, single),
            None => {
                let path = match &cli_args.config {
                    Some(path) => path.clone(),
                    None => find_default_config().ok_or_else(|| {
                        anyhow!("No config file found (tried {})", DEFAULT_CONFIG_PATHS.join(", "))
                    })?,
                };
                Self::from_file(&cli_args, &path)
            }
        }
    }

    /// Config-driven driver: every table definition in the file
    fn from_file(cli_args: &CliArgs, path: &Path) -> anyhow::Result<Self> {
        let config_content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not load config file '{}'", path.display()))?;
        let config_file = toml::from_str::<ConfigFile>(&config_content)
            .with_context(|| format!("Could not parse config file '{}'", path.display()))?;

        let sleep_time = parse_duration(&config_file.sleep_time)
            .context("Could not parse sleep time")?;

        if config_file.tables.is_empty() {
            bail!("No tables defined in '{}'", path.display());
        }

        let tables = config_file
            .tables
            .iter()
            .map(|(name, table)| {
                TableDefinition::new(
                    name,
                    &table.search_next_hop,
                    table.target_table,
                    table.rule_priority,
                )
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let level = cli_args.log_level.as_deref().unwrap_or(&config_file.logging.level);
        let log_level = parse_log_level(level)?;

        Ok(Config {
            source: ConfigSource::File(path.to_path_buf()),
            sleep_time,
            tables,
            log_level,
            ip_command: cli_args
                .ip_command
                .clone()
                .or(config_file.ip_command)
                .unwrap_or_else(|| "ip".to_string()),
            dry_run: cli_args.dry_run || config_file.dry_run,
            once: cli_args.once,
        })
    }

    /// Single-definition driver: one table from the command line and constants
    fn single(cli_args: &CliArgs, single: &SingleArgs) -> anyhow::Result<Self> {
        let table = TableDefinition::new(
            DEFAULT_TABLE_NAME,
            &single.next_hop,
            single.table,
            single.priority,
        )?;
        let sleep_time = parse_duration(&single.interval).context("Could not parse interval")?;

        Ok(Config {
            source: ConfigSource::CommandLine,
            sleep_time,
            tables: vec![table],
            log_level: parse_log_level(cli_args.log_level.as_deref().unwrap_or("info"))?,
            ip_command: cli_args.ip_command.clone().unwrap_or_else(|| "ip".to_string()),
            dry_run: cli_args.dry_run,
            once: cli_args.once,
        })
    }
}

fn find_default_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow!("Invalid log level: {}", level_str)),
    }
}

/// Parse a duration such as "300ms", "30s", "5m", "1.5h" or "1m30s".
///
/// Units: ns, us (or µs), ms, s, m, h. The total must be positive.
pub fn parse_duration(input: &str) -> anyhow::Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty duration");
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            bail!("invalid duration '{}'", input);
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| anyhow!("invalid duration '{}'", input))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos: u64 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3600 * 1_000_000_000,
            "" => bail!("missing unit in duration '{}'", input),
            unit => bail!("unknown unit '{}' in duration '{}'", unit, input),
        };
        rest = &rest[unit_len..];

        total += Duration::from_nanos((value * unit_nanos as f64).round() as u64);
    }

    if total.is_zero() {
        bail!("duration '{}' must be positive", input);
    }

    Ok(total)
}
