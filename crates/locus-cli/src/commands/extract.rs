//! Extract command implementation.

use super::{build_provider, pipeline_config, read_paper};
use crate::cli::ExtractArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use locus_extractor::{CancellationToken, Extractor};
use tracing::{info, warn};

/// Execute the extract command.
pub async fn execute_extract(args: ExtractArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let document = read_paper(&args.paper)?;
    let mut pipeline = pipeline_config(&config.extractor, &args.paper)?;
    if let Some(percentile) = args.percentile {
        pipeline.percentile_cutoff = percentile;
    }

    let provider = build_provider(config, Some(&args.endpoint), &pipeline.model)?;
    let extractor = Extractor::new(provider, pipeline)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding chunk calls");
            on_interrupt.cancel();
        }
    });

    let mut result = extractor.extract_with_cancellation(&document, cancel).await?;
    info!(
        "Extracted {} location(s) from '{}'",
        result.locations.len(),
        result.document_id
    );
    if args.strict {
        result = result.into_strict()?;
    }

    println!("{}", formatter.format_result(&result, args.all)?);
    Ok(())
}
