//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Semantic book search backed by Gemini embeddings.
#[derive(Parser, Debug)]
#[command(name = "semsearch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Redis URL for the embedding cache (in-process cache when unset)
    #[arg(long, env = "REDIS_URL", global = true)]
    pub redis: Option<String>,

    /// JSON file holding the book collection
    #[arg(long, env = "SEMSEARCH_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// End-to-end deadline for a command, in seconds [default: 5]
    #[arg(long, global = true)]
    pub request_timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Embed a book's description and add it to the collection
    Add {
        /// Book title
        #[arg(short, long)]
        title: String,

        /// Free-text description; this is what gets embedded
        #[arg(short, long)]
        description: String,

        /// Caller-supplied unique id, e.g. an ISBN
        #[arg(long)]
        external_id: Option<String>,
    },

    /// Rank the collection by similarity to a query
    Search {
        /// Query text
        query: String,

        /// Print at most this many results (0 or unset for all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_add() {
        let cli = Cli::parse_from([
            "semsearch",
            "add",
            "--title",
            "Dune",
            "--description",
            "A desert planet, spice, prophecy.",
            "--external-id",
            "isbn-dune",
        ]);
        assert_eq!(
            cli.command,
            Commands::Add {
                title: "Dune".to_string(),
                description: "A desert planet, spice, prophecy.".to_string(),
                external_id: Some("isbn-dune".to_string()),
            }
        );
    }

    #[test]
    fn test_cli_search_with_limit() {
        let cli = Cli::parse_from(["semsearch", "search", "space opera", "-n", "3"]);
        assert_eq!(
            cli.command,
            Commands::Search {
                query: "space opera".to_string(),
                limit: Some(3),
            }
        );
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "semsearch",
            "search",
            "whales",
            "--store",
            "/tmp/books.json",
            "--request-timeout-secs",
            "30",
        ]);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/books.json")));
        assert_eq!(cli.request_timeout_secs, Some(30));
    }

    #[test]
    fn test_cli_timeout_unset() {
        let cli = Cli::parse_from(["semsearch", "search", "whales"]);
        assert_eq!(cli.request_timeout_secs, None);
    }

    #[test]
    fn test_cli_add_requires_title() {
        let result = Cli::try_parse_from(["semsearch", "add", "--description", "text"]);
        assert!(result.is_err());
    }
}
