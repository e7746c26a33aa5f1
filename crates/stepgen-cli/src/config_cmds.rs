//! `stepgen config list|get|set`.

use anyhow::Result;

use stepgen_core::ProjectLayout;

use crate::ConfigCommands;
use crate::config;

pub fn run_config_command(command: ConfigCommands, layout: &ProjectLayout) -> Result<()> {
    match command {
        ConfigCommands::List => {
            let project = config::load_config(layout)?;
            for (key, value) in config::list_values(&project) {
                println!("{key} = {}", value.as_deref().unwrap_or("(unset)"));
            }
        }
        ConfigCommands::Get { key } => {
            config::check_readable(&key)?;
            let project = config::load_config(layout)?;
            match config::value_of(&project, &key) {
                Some(value) => println!("{value}"),
                None => println!("(unset)"),
            }
        }
        ConfigCommands::Set { key, value } => {
            config::load_config(layout)?;
            config::set_value(layout, &key, &value)?;
            println!("{key} updated");
        }
    }
    Ok(())
}
