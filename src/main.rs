use clap::{Parser, Subcommand};
use std::path::PathBuf;
use supercon_search::Result;
use supercon_search::commands;
use supercon_search::config::{Config, get_config_dir, run_interactive_config, show_config};
use supercon_search::corpus::DifficultyLevel;
use supercon_search::evaluate::DEFAULT_K;
use supercon_search::scrapers::Source;
use supercon_search::search::parse_difficulty_filter;

const DEFAULT_SEED: u64 = 42;

#[derive(Parser)]
#[command(name = "supercon-search")]
#[command(about = "Difficulty-aware semantic search over superconductivity literature")]
#[command(version)]
struct Cli {
    /// Data and configuration directory (default: ~/.supercon-search)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding server and search defaults
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Collect raw documents from one source, or from all of them
    Scrape {
        #[arg(value_enum)]
        source: Option<Source>,
        /// Stop after this many documents per source
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Merge raw files into the corpus (defaults to every file in raw/)
    Merge { inputs: Vec<PathBuf> },
    /// Generate positive query/document pairs
    Queries {
        /// Use title templates instead of the LLM
        #[arg(long)]
        offline: bool,
        /// Process only the first N documents
        #[arg(long)]
        limit: Option<usize>,
        /// Continue from the last checkpoint
        #[arg(long)]
        resume: bool,
    },
    /// Add hard negatives and filter weak, low-quality and off-topic pairs
    Pairs {
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Verify pairs and export the training and evaluation datasets
    Dataset {
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Encode the corpus and write the search index
    BuildIndex,
    /// Search once, or start an interactive prompt when no query is given
    Search {
        query: Option<String>,
        /// Number of results
        #[arg(long, short = 'n')]
        results: Option<usize>,
        /// Only show documents of this level: 1-5 or "all"
        #[arg(long, value_parser = parse_difficulty_arg)]
        difficulty: Option<DifficultyArg>,
    },
    /// Start the web UI and JSON API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Recall@k, MRR and nDCG@k on the held-out queries
    Evaluate {
        #[arg(long, short, default_value_t = DEFAULT_K)]
        k: usize,
    },
    /// Show which pipeline outputs exist
    Status,
}

/// Parsed `--difficulty`; "all" is an explicit no-filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DifficultyArg(Option<DifficultyLevel>);

fn parse_difficulty_arg(value: &str) -> std::result::Result<DifficultyArg, String> {
    parse_difficulty_filter(value)
        .map(DifficultyArg)
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&data_dir)?;
        } else {
            run_interactive_config(&data_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&data_dir)?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Scrape { source, limit } => {
            commands::scrape(&config, source, limit).await?;
        }
        Commands::Merge { inputs } => {
            commands::merge(&config, &inputs)?;
        }
        Commands::Queries {
            offline,
            limit,
            resume,
        } => {
            commands::queries(&config, offline, limit, resume)?;
        }
        Commands::Pairs { seed } => {
            commands::pairs(&config, seed)?;
        }
        Commands::Dataset { seed } => {
            commands::dataset(&config, seed)?;
        }
        Commands::BuildIndex => {
            commands::build_search_index(&config)?;
        }
        Commands::Search {
            query,
            results,
            difficulty,
        } => {
            let engine = commands::load_engine(&config)?;
            let difficulty = difficulty.and_then(|arg| arg.0);
            match query {
                Some(query) => commands::search_once(&engine, &query, results, difficulty)?,
                None => commands::interactive_search(&engine, difficulty)?,
            }
        }
        Commands::Serve { port } => {
            commands::serve(&config, port).await?;
        }
        Commands::Evaluate { k } => {
            commands::run_evaluation(&config, k)?;
        }
        Commands::Status => {
            commands::show_status(&config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["supercon-search", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
            assert!(parsed.data_dir.is_none());
        }
    }

    #[test]
    fn global_data_dir() {
        let cli = Cli::try_parse_from(["supercon-search", "build-index", "--data-dir", "/tmp/sc"])
            .expect("should parse");
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/sc")));
        assert!(matches!(cli.command, Commands::BuildIndex));
    }

    #[test]
    fn scrape_command_with_source() {
        let cli = Cli::try_parse_from(["supercon-search", "scrape", "simple-wikipedia", "--limit", "5"])
            .expect("should parse");

        if let Commands::Scrape { source, limit } = cli.command {
            assert_eq!(source, Some(Source::SimpleWikipedia));
            assert_eq!(limit, Some(5));
        } else {
            panic!("expected scrape command");
        }
    }

    #[test]
    fn scrape_rejects_unknown_source() {
        let cli = Cli::try_parse_from(["supercon-search", "scrape", "reddit"]);
        assert!(cli.is_err());
    }

    #[test]
    fn queries_flags() {
        let cli = Cli::try_parse_from(["supercon-search", "queries", "--offline", "--resume"])
            .expect("should parse");

        if let Commands::Queries {
            offline,
            limit,
            resume,
        } = cli.command
        {
            assert!(offline);
            assert!(resume);
            assert_eq!(limit, None);
        } else {
            panic!("expected queries command");
        }
    }

    #[test]
    fn pairs_default_seed() {
        let cli = Cli::try_parse_from(["supercon-search", "pairs"]).expect("should parse");
        if let Commands::Pairs { seed } = cli.command {
            assert_eq!(seed, DEFAULT_SEED);
        } else {
            panic!("expected pairs command");
        }
    }

    #[test]
    fn search_with_difficulty() {
        let cli = Cli::try_parse_from([
            "supercon-search",
            "search",
            "cuprate superconductors",
            "--difficulty",
            "3",
            "-n",
            "5",
        ])
        .expect("should parse");

        if let Commands::Search {
            query,
            results,
            difficulty,
        } = cli.command
        {
            assert_eq!(query.as_deref(), Some("cuprate superconductors"));
            assert_eq!(results, Some(5));
            assert_eq!(difficulty, Some(DifficultyArg(Some(DifficultyLevel::ADVANCED))));
        } else {
            panic!("expected search command");
        }
    }

    #[test]
    fn search_without_query_is_interactive() {
        let cli = Cli::try_parse_from(["supercon-search", "search", "--difficulty", "all"])
            .expect("should parse");
        if let Commands::Search {
            query, difficulty, ..
        } = cli.command
        {
            assert!(query.is_none());
            assert_eq!(difficulty, Some(DifficultyArg(None)));
        } else {
            panic!("expected search command");
        }
    }

    #[test]
    fn search_rejects_bad_difficulty() {
        let cli = Cli::try_parse_from(["supercon-search", "search", "x", "--difficulty", "7"]);
        assert!(cli.is_err());
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["supercon-search", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn evaluate_k() {
        let cli = Cli::try_parse_from(["supercon-search", "evaluate", "-k", "20"]).expect("should parse");
        if let Commands::Evaluate { k } = cli.command {
            assert_eq!(k, 20);
        } else {
            panic!("expected evaluate command");
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["supercon-search", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["supercon-search", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
