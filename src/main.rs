use anyhow::Result;
use clap::{Parser, Subcommand};
use patchforge::commands::{generate_patch, index_repo, search_index, show_status};
use patchforge::config::show_config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "patchforge")]
#[command(about = "Retrieval-augmented patch generation for code repositories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the semantic index for a repository
    Index {
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
    /// Search the index and print the closest code chunks
    Search {
        /// Natural-language query
        query: String,
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Number of results to return
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Plan a change and generate a unified diff for it
    Generate {
        /// The requirement to implement
        requirement: String,
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Where to write the patch (defaults to patchforge.patch in the repo)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show repository and index status
    Status {
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
    /// Print the effective configuration
    Config {
        /// Path to the git repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index { repo } => {
            index_repo(&repo).await?;
        }
        Commands::Search { query, repo, top_k } => {
            search_index(&repo, &query, top_k).await?;
        }
        Commands::Generate {
            requirement,
            repo,
            output,
        } => {
            generate_patch(&repo, &requirement, output.as_deref()).await?;
        }
        Commands::Status { repo } => {
            show_status(&repo).await?;
        }
        Commands::Config { repo } => {
            show_config(&repo)?;
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
        let cli = Cli::try_parse_from(["patchforge", "index"]);
        assert!(cli.is_ok());
        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Index { .. }));
        }

        let cli = Cli::try_parse_from(["patchforge", "search", "where is auth handled"]);
        assert!(cli.is_ok());
        if let Ok(parsed) = cli {
            match parsed.command {
                Commands::Search { query, repo, top_k } => {
                    assert_eq!(query, "where is auth handled");
                    assert_eq!(repo, PathBuf::from("."));
                    assert_eq!(top_k, None);
                }
                _ => panic!("expected search command"),
            }
        }
    }

    #[test]
    fn cli_generate_with_options() {
        let cli = Cli::try_parse_from([
            "patchforge",
            "generate",
            "add retries to the http client",
            "--repo",
            "/tmp/project",
            "--output",
            "/tmp/out.patch",
        ])
        .unwrap();

        match cli.command {
            Commands::Generate {
                requirement,
                repo,
                output,
            } => {
                assert_eq!(requirement, "add retries to the http client");
                assert_eq!(repo, PathBuf::from("/tmp/project"));
                assert_eq!(output, Some(PathBuf::from("/tmp/out.patch")));
            }
            _ => panic!("expected generate command"),
        }
    }

    #[test]
    fn cli_search_top_k() {
        let cli =
            Cli::try_parse_from(["patchforge", "search", "query", "--top-k", "3"]).unwrap();
        match cli.command {
            Commands::Search { top_k, .. } => assert_eq!(top_k, Some(3)),
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn cli_rejects_missing_arguments() {
        let cli = Cli::try_parse_from(["patchforge", "search"]);
        assert!(cli.is_err());
        if let Err(e) = cli {
            assert_eq!(e.kind(), ErrorKind::MissingRequiredArgument);
        }

        let cli = Cli::try_parse_from(["patchforge"]);
        assert!(cli.is_err());
    }
}
