use anyhow::Result;
use depot_config::Config;

use crate::cli::ConfigCommands;

pub fn handle(cmd: ConfigCommands, config: &Config) -> Result<()> {
    match cmd {
        ConfigCommands::Path => {
            println!("{}", Config::config_path().display());
            Ok(())
        }
        ConfigCommands::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}
