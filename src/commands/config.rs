use anyhow::Result;
use std::path::PathBuf;

use pagewatch::Settings;

pub fn handle_config(config: Option<PathBuf>) -> Result<()> {
    let settings = Settings::load(config.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
