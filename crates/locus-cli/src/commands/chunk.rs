//! Chunk command implementation.

use super::{build_provider, pipeline_config, read_paper};
use crate::cli::ChunkArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use locus_extractor::Extractor;

/// Execute the chunk command.
///
/// Runs the pipeline up to chunking; no model is called.
pub async fn execute_chunk(args: ChunkArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let document = read_paper(&args.paper)?;
    let pipeline = pipeline_config(&config.extractor, &args.paper)?;
    let provider = build_provider(config, None, &pipeline.model)?;
    let extractor = Extractor::new(provider, pipeline)?;

    let prepared = extractor.prepare(&document)?;
    println!("{}", formatter.format_chunks(&prepared.chunks, args.full)?);
    if !prepared.warnings.is_empty() {
        eprintln!("{}", formatter.warnings(&prepared.warnings));
    }
    Ok(())
}
