//! Config command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use fcindex_core::IndexConfig;

use crate::cli::OutputFormat;
use crate::output::{print_json, print_success};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config file to load. Prints the built-in default when omitted.
    pub file: Option<PathBuf>,

    /// Only validate the file
    #[arg(long, requires = "file")]
    pub check: bool,
}

/// Execute the config command.
pub fn execute(args: ConfigArgs, format: OutputFormat) -> Result<()> {
    let config = match &args.file {
        Some(path) => IndexConfig::from_file(path)?,
        None => IndexConfig::default(),
    };

    if args.check {
        let path = args.file.as_deref().map(|p| p.display().to_string());
        print_success(&format!(
            "{} is valid ({} stages, target size {})",
            path.unwrap_or_default(),
            config.stages.len(),
            config.selection.target_size
        ));
        return Ok(());
    }

    match format {
        OutputFormat::Table => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => print_json(&config)?,
    }

    Ok(())
}
