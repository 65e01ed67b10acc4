//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use locus_extractor::ExtractorConfig;
use std::path::Path;

/// Execute the config command.
pub async fn execute_config(
    args: ConfigArgs,
    config: &Config,
    path: Option<&Path>,
    formatter: &Formatter,
) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::path()?,
    };

    match args.action {
        ConfigAction::Show => {
            println!("{}", redacted(config).to_toml()?);
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Init { force, preset } => init_config(&path, force, preset.as_deref(), formatter),
    }
}

fn init_config(path: &Path, force: bool, preset: Option<&str>, formatter: &Formatter) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    let mut config = Config::default();
    if let Some(name) = preset {
        config.extractor = ExtractorConfig::preset(name)
            .ok_or_else(|| CliError::InvalidInput(format!("Unknown preset '{}'", name)))?;
    }
    config.save(path)?;
    println!("{}", formatter.success(&format!("Wrote {}", path.display())));
    Ok(())
}

/// Copy of `config` safe to print.
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("********".to_string());
    }
    shown
}
