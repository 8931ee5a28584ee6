use std::path::Path;

use crate::cli::{InitConfigArgs, ShowConfigArgs};
use crate::config::{default_config_path, write_default_config, Config};
use crate::error::Result;

pub fn init(args: InitConfigArgs, config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    write_default_config(&path, args.force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

pub fn show(args: ShowConfigArgs, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let service = config.into_service_config()?;
    println!("{}", service.settings_summary());
    println!("Log file: {}", service.log_file.display());
    Ok(())
}
