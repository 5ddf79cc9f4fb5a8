use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::app::{get_config_dir, init_config, use_case_path, Config};
use crate::download::{load_matching, FileUseCaseStore};

use super::Commands;

/// Handle CLI subcommands
pub fn handle_command(command: &Commands, config: &Config, path: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Init => {
            println!("Initializing Parley configuration...");
            match init_config(path)? {
                Some(file) => println!(
                    "  {} Created configuration at: {}",
                    "[OK]".green(),
                    file.display()
                ),
                None => println!("  {} Configuration already exists", "[OK]".green()),
            }
            Ok(())
        }
        Commands::Config => show_config(config),
        Commands::Check => {
            let missing = check_config(config)?;
            if !missing.is_empty() {
                anyhow::bail!("{} required setting(s) missing", missing.len());
            }
            Ok(())
        }
    }
}

/// Print the effective configuration as TOML
pub fn show_config(config: &Config) -> Result<()> {
    println!("# Config directory: {}", get_config_dir()?.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Report the state of every setting the runtime needs. Returns the missing ones.
pub fn check_config(config: &Config) -> Result<Vec<&'static str>> {
    println!("Parley Status:");
    println!();

    let missing = config.missing_values();
    if missing.is_empty() {
        println!("  {} Engine: license, developer token and use case configured", "[OK]".green());
    } else {
        for name in &missing {
            println!("  {} {}: not set", "[ERROR]".red(), name);
        }
    }

    let store = FileUseCaseStore::new(use_case_path()?);
    let expected = config.download_settings().use_case_version;
    match load_matching(&store, expected.as_deref()) {
        Some(use_case) => println!(
            "  {} Use case deployed (version {})",
            "[OK]".green(),
            use_case.version.as_deref().unwrap_or("unversioned")
        ),
        None => println!("  {} No use case deployed yet", "[WARNING]".yellow()),
    }

    let credentials = config.cloud_credentials();
    for cloud in config.cloud_models() {
        let has_key = credentials.iter().any(|(name, _)| *name == cloud.provider);
        let vision = if cloud.model.kind.is_vision() { ", vision" } else { "" };
        if has_key {
            println!(
                "  {} Cloud {}: {}{}",
                "[OK]".green(),
                cloud.provider,
                cloud.model.id,
                vision
            );
        } else {
            println!(
                "  {} Cloud {}: {}{} (no api key)",
                "[WARNING]".yellow(),
                cloud.provider,
                cloud.model.id,
                vision
            );
        }
    }

    Ok(missing)
}
