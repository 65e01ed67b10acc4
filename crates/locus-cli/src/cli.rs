//! CLI command definitions and argument parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Locus CLI - Extract study locations from scientific papers.
#[derive(Debug, Parser)]
#[command(name = "locus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (names only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract locations from a paper's text
    Extract(ExtractArgs),

    /// Show how a paper's text would be chunked
    Chunk(ChunkArgs),

    /// Find the DOI in a paper's text
    Doi(DoiArgs),

    /// Extract title, authors, journal, year, keywords and DOI
    Metadata(MetadataArgs),

    /// Show or create the configuration file
    Config(ConfigArgs),
}

/// Input paper and pipeline settings shared by several commands.
#[derive(Debug, Args)]
pub struct PaperArgs {
    /// Plain-text file with the paper body
    pub file: PathBuf,

    /// Plain-text file with the paper abstract
    #[arg(short, long = "abstract")]
    pub abstract_file: Option<PathBuf>,

    /// Document identifier (defaults to the file stem)
    #[arg(long)]
    pub id: Option<String>,

    /// Start from a named preset (default, thorough, fast)
    #[arg(long)]
    pub preset: Option<String>,

    /// Model identifier
    #[arg(short, long)]
    pub model: Option<String>,

    /// Token budget of one chunk
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Share of the budget repeated between chunks (0.0-1.0)
    #[arg(long)]
    pub overlap: Option<f64>,

    /// Do not prepend the abstract to chunks
    #[arg(long)]
    pub no_abstract: bool,

    /// Only use windows of this many bytes around location cue phrases
    #[arg(long)]
    pub keyword_window: Option<usize>,

    /// Remove hyphen breaks and parenthesised citations before processing
    #[arg(long)]
    pub strip_citations: bool,

    /// Drop the reference list and other back matter
    #[arg(long)]
    pub trim_back_matter: bool,
}

/// LLM endpoint settings.
#[derive(Debug, Args)]
pub struct EndpointArgs {
    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "LLM_API_URL")]
    pub api_url: Option<String>,

    /// API key
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub paper: PaperArgs,

    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Percentile a location's importance must reach to be retained
    #[arg(short, long)]
    pub percentile: Option<f64>,

    /// Show locations that did not pass the filter
    #[arg(long)]
    pub all: bool,

    /// Fail when every chunk call failed
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the chunk command.
#[derive(Debug, Parser)]
pub struct ChunkArgs {
    #[command(flatten)]
    pub paper: PaperArgs,

    /// Print full chunk texts instead of a summary
    #[arg(long)]
    pub full: bool,
}

/// Arguments for the doi command.
#[derive(Debug, Parser)]
pub struct DoiArgs {
    /// Plain-text file to search
    pub file: PathBuf,
}

/// Arguments for the metadata command.
#[derive(Debug, Parser)]
pub struct MetadataArgs {
    /// Plain-text file with the paper text
    pub file: PathBuf,

    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Model used for metadata extraction
    #[arg(short, long, env = "LLM_MODEL_METADATA")]
    pub model: Option<String>,

    /// Bytes of text treated as the first page when no page break is found
    #[arg(long, default_value = "4000")]
    pub first_page_bytes: usize,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the configuration file location
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Preset to write (default, thorough, fast)
        #[arg(long)]
        preset: Option<String>,
    },
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_command() {
        let cli = Cli::parse_from([
            "locus",
            "extract",
            "paper.txt",
            "--abstract",
            "abstract.txt",
            "--max-tokens",
            "8000",
            "--percentile",
            "60",
        ]);
        match cli.command {
            Command::Extract(args) => {
                assert_eq!(args.paper.file, PathBuf::from("paper.txt"));
                assert_eq!(args.paper.abstract_file, Some(PathBuf::from("abstract.txt")));
                assert_eq!(args.paper.max_tokens, Some(8000));
                assert_eq!(args.percentile, Some(60.0));
                assert!(!args.all);
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["locus", "doi", "paper.txt", "--format", "json", "-v"]);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Doi(_)));
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["locus", "config", "init", "--force"]);
        match cli.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { force, preset },
            }) => {
                assert!(force);
                assert!(preset.is_none());
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_missing_file_is_rejected() {
        assert!(Cli::try_parse_from(["locus", "extract"]).is_err());
    }
}
