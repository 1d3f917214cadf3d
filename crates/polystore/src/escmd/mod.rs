//! The `es-index` administration command.
//!
//! Drives the Elasticsearch write-index lifecycle from the command line:
//! list indices, install a fresh write index for a relation, commit or roll
//! it back, and (with explicit confirmation) delete a physical index.

use clap::{CommandFactory, Parser, Subcommand};

use crate::backends::elastic::{Elastic, ElasticConfig};
use crate::error::StoreResult;

/// Command-line interface of the `es-index` binary.
#[derive(Debug, Parser)]
#[command(
    name = "es-index",
    about = "Manage the Elasticsearch indices behind a polystore deployment",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Elasticsearch node URL.
    #[arg(long, env = "ES_NODE", default_value = "http://localhost:9200")]
    pub node: String,

    /// Index name prefix.
    #[arg(long, env = "ES_INDEX_PREFIX", default_value = "polystore")]
    pub index_prefix: String,

    /// Username for basic authentication.
    #[arg(long, env = "ES_USERNAME")]
    pub username: Option<String>,

    /// Password for basic authentication.
    #[arg(long, env = "ES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// The sub-command to run; omitted prints the usage text.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// The administration sub-commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lists all indices under the configured prefix.
    List,

    /// Creates a fresh write index for a relation; reads keep serving from
    /// the current index until `commit`.
    Create {
        /// The relation to reindex.
        relation: String,
    },

    /// Commits the write index: searches move onto it atomically.
    Commit {
        /// The relation whose write index is committed.
        relation: String,
    },

    /// Discards the write index and keeps serving from the current one.
    Rollback {
        /// The relation whose write index is discarded.
        relation: String,
    },

    /// Deletes a physical index outright. Destructive; pass the literal
    /// confirmation YES as the second argument.
    Delete {
        /// The physical index name.
        index: String,
        /// Must be the literal YES.
        confirmation: Option<String>,
    },

    #[command(external_subcommand)]
    #[doc(hidden)]
    Other(Vec<String>),
}

impl Cli {
    fn config(&self) -> ElasticConfig {
        let mut config = ElasticConfig::default()
            .with_node(self.node.clone())
            .with_index_prefix(self.index_prefix.clone());
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_basic_auth(username, password);
        }
        config
    }
}

/// Executes the parsed command line.
///
/// A missing or unrecognized sub-command prints the usage text and returns
/// successfully; only actual execution failures produce an error.
pub async fn run(cli: Cli) -> StoreResult<()> {
    let config = cli.config();
    let command = match cli.command {
        Some(Command::Other(args)) => {
            if let Some(unknown) = args.first() {
                eprintln!("unknown command '{}'\n", unknown);
            }
            print_usage();
            return Ok(());
        }
        Some(command) => command,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let elastic = Elastic::new(config)?;
    match command {
        Command::List => {
            let indices = elastic.list_indices().await?;
            if indices.is_empty() {
                println!("no indices under prefix '{}'", cli.index_prefix);
                return Ok(());
            }
            println!("{:<40} {:>8} {:>12} {:>10}", "INDEX", "HEALTH", "DOCS", "SIZE");
            for info in indices {
                println!(
                    "{:<40} {:>8} {:>12} {:>10}",
                    info.name, info.health, info.docs, info.size
                );
            }
        }
        Command::Create { relation } => {
            let physical = elastic.create_write_index(&relation).await?;
            println!("created write index {} for '{}'", physical, relation);
            println!("index into {}, then run: es-index commit {}", elastic.write_alias(&relation), relation);
        }
        Command::Commit { relation } => {
            elastic.commit_write_index(&relation).await?;
            println!("committed write index for '{}': searches now serve from it", relation);
        }
        Command::Rollback { relation } => {
            elastic.rollback_write_index(&relation).await?;
            println!("rolled back write index for '{}'", relation);
        }
        Command::Delete { index, confirmation } => {
            elastic
                .delete_index(&index, confirmation.as_deref().unwrap_or_default())
                .await?;
            println!("deleted index {}", index);
        }
        Command::Other(_) => unreachable!("handled above"),
    }
    Ok(())
}

fn print_usage() {
    // Errors writing usage to stdout are not actionable here.
    let _ = Cli::command().print_help();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_lifecycle_commands() {
        let cli = Cli::parse_from(["es-index", "create", "products"]);
        assert!(matches!(
            cli.command,
            Some(Command::Create { ref relation }) if relation == "products"
        ));

        let cli = Cli::parse_from(["es-index", "delete", "polystore_products-20260826", "YES"]);
        assert!(matches!(
            cli.command,
            Some(Command::Delete { ref confirmation, .. }) if confirmation.as_deref() == Some("YES")
        ));
    }

    #[test]
    fn test_unknown_subcommand_is_captured_not_rejected() {
        let cli = Cli::parse_from(["es-index", "frobnicate", "products"]);
        assert!(matches!(cli.command, Some(Command::Other(ref args)) if args[0] == "frobnicate"));
    }

    #[test]
    fn test_missing_subcommand_is_accepted() {
        let cli = Cli::parse_from(["es-index"]);
        assert!(cli.command.is_none());
    }

    #[tokio::test]
    async fn test_unknown_subcommand_exits_cleanly() {
        let cli = Cli::parse_from(["es-index", "frobnicate"]);
        assert!(run(cli).await.is_ok());
    }
}
