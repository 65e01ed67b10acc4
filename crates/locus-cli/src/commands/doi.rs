//! DOI command implementation.

use crate::cli::DoiArgs;
use crate::error::Result;
use crate::output::Formatter;
use locus_extractor::find_doi;
use std::fs;

/// Execute the doi command.
pub async fn execute_doi(args: DoiArgs, formatter: &Formatter) -> Result<()> {
    let text = fs::read_to_string(&args.file)?;
    let doi = find_doi(&text);
    println!("{}", formatter.format_doi(doi.as_deref())?);
    Ok(())
}
