//! Config command implementation.

use anyhow::{Context, Result};

use clipferry_core::config::Config;

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }
        ConfigAction::Show => {
            let config = Config::load()?;
            config.validate()?;
            let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{text}");
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!(
                "  Configuration reset to defaults: {}",
                Config::config_path().display()
            );
        }
    }

    Ok(())
}
