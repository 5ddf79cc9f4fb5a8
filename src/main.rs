use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use parley::{
    app::{load_config, Config},
    cli::{check_config, handle_command, Cli, Commands},
    utils::init_logger,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // init may target a file that does not exist yet
    let config = match cli.command {
        Some(Commands::Init) => Config::default(),
        _ => load_config(cli.config.as_deref())?,
    };
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_logger(level);

    match &cli.command {
        Some(command) => handle_command(command, &config, cli.config.clone()),
        None => {
            println!("{} v{}", "Parley".bold(), env!("CARGO_PKG_VERSION"));
            println!();
            check_config(&config)?;
            Ok(())
        }
    }
}
