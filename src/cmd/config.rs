//! Configuration view and init commands — `deplik config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;
use deplik::config::{CONFIG_FILE_NAME, DeplikConfig};

pub fn cmd_config(
    dir: &Path,
    command: Option<ConfigCommands>,
    effective: &DeplikConfig,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config_path = dir.join(CONFIG_FILE_NAME);
            println!();
            println!("Deplik Configuration");
            println!("====================");
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found, using defaults", CONFIG_FILE_NAME);
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!();
            print!("{}", effective.to_toml()?);
        }
        Some(ConfigCommands::Init) => {
            let path = DeplikConfig::write_default(dir)?;
            println!("Created {}", path.display());
        }
    }
    Ok(())
}
