use std::path::Path;

use feedstore::{
    cli::parse_cli,
    cmds::cache,
    config::{read_config, ConfigProperties},
    error, logging, Result,
};

fn main() -> Result<()> {
    let option_args = parse_cli();
    let cli_args = option_args.cli_args;
    logging::init(cli_args.verbose);
    let home_dir = std::env::var("HOME")
        .map_err(|_| error::gen("HOME is not set. Unable to locate the config file"))?;
    let mut config = read_config(cli_args.config.as_deref().map(Path::new), &home_dir)?;
    if let Some(store) = cli_args.store {
        config = config.with_store_location(store);
    }
    let default_location = config.store_location().is_none();
    let config = config.or_default_location(&home_dir);
    // The default store directory is created on first use. Configured
    // locations must already exist.
    if default_location {
        if let Some(parent) = config.store_location().map(Path::new).and_then(Path::parent) {
            std::fs::create_dir_all(parent)?;
        }
    }
    cache::execute(option_args.cli_options, &config, &mut std::io::stdout().lock())
}
