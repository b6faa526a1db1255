use chrono::{DateTime, Utc};
use clap::Parser;

#[derive(Parser)]
#[command(about = "Single-slot local cache for a feed snapshot")]
struct Args {
    #[clap(subcommand)]
    pub command: Command,
    /// Path to the config file. Defaults to ~/.config/feedstore/config.toml
    #[clap(long, global = true, value_name = "PATH")]
    pub config: Option<String>,
    /// Store file to use. Overrides the config file
    #[clap(long, global = true, value_name = "PATH")]
    pub store: Option<String>,
    /// Verbose mode. Logs store operations to stderr
    #[clap(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Parser)]
enum Command {
    #[clap(about = "Print the cached feed as JSON")]
    Retrieve,
    #[clap(about = "Replace the cached feed with the feed in a JSON file")]
    Insert(InsertCommand),
    #[clap(about = "Delete the cached feed")]
    Delete,
    #[clap(about = "Get store location, size and cached feed summary")]
    Info,
}

#[derive(Parser)]
struct InsertCommand {
    /// JSON file holding an array of feed items
    #[clap(long, value_name = "PATH")]
    pub file: String,
    /// Creation time of the snapshot in RFC 3339. Defaults to now
    #[clap(long, value_parser = parse_timestamp)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| format!("Invalid RFC 3339 timestamp {value}: {err}"))
}

pub struct InsertOptions {
    pub file: String,
    pub timestamp: Option<DateTime<Utc>>,
}

pub enum CliOptions {
    Retrieve,
    Insert(InsertOptions),
    Delete,
    Info,
}

impl From<Command> for CliOptions {
    fn from(command: Command) -> Self {
        match command {
            Command::Retrieve => CliOptions::Retrieve,
            Command::Insert(options) => CliOptions::Insert(InsertOptions {
                file: options.file,
                timestamp: options.timestamp,
            }),
            Command::Delete => CliOptions::Delete,
            Command::Info => CliOptions::Info,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub store: Option<String>,
    pub verbose: bool,
}

pub struct OptionArgs {
    pub cli_options: CliOptions,
    pub cli_args: CliArgs,
}

impl From<Args> for OptionArgs {
    fn from(args: Args) -> Self {
        OptionArgs {
            cli_options: args.command.into(),
            cli_args: CliArgs {
                config: args.config,
                store: args.store,
                verbose: args.verbose,
            },
        }
    }
}

pub fn parse_cli() -> OptionArgs {
    Args::parse().into()
}
