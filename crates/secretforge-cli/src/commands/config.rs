use anyhow::Result;
use colored::Colorize;
use secretforge_controller::AppConfig;

use crate::output::print_success;

pub fn check_config(config: &AppConfig, source: Option<&str>) -> Result<()> {
    print_success(&format!(
        "Configuration is valid ({})",
        source.unwrap_or("defaults and environment")
    ));
    println!("{}", "# effective configuration".dimmed());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
