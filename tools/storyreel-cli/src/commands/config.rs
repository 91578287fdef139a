//! Show or initialise the configuration file.

use storyreel_common::config::AppConfig;

pub fn run(config: &AppConfig, init: bool) -> anyhow::Result<()> {
    let path = AppConfig::path();

    if init {
        if path.exists() {
            println!("Config already exists at {}", path.display());
        } else {
            AppConfig::default()
                .save()
                .map_err(|e| anyhow::anyhow!("Failed to write config to {}: {e}", path.display()))?;
            println!("Wrote default config to {}", path.display());
            return Ok(());
        }
    }

    println!("Config file: {}", path.display());
    if !path.exists() {
        println!("  (not found, using defaults; run `storyreel config --init` to create it)");
    }
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
