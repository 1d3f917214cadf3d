//! Elasticsearch index administration CLI.
//!
//! # Usage
//!
//! ```bash
//! # List all indices under the configured prefix
//! es-index list
//!
//! # Reindex a relation: install a write index, fill it, then commit
//! es-index create products
//! es-index commit products
//!
//! # Or discard an in-progress reindex
//! es-index rollback products
//!
//! # Delete a physical index (requires the literal YES)
//! es-index delete polystore_products-20260826120000 YES
//! ```
//!
//! # Environment Variables
//!
//! - `ES_NODE` - Elasticsearch node URL (default: http://localhost:9200)
//! - `ES_INDEX_PREFIX` - Index name prefix (default: polystore)
//! - `ES_USERNAME` / `ES_PASSWORD` - Basic auth credentials

use clap::Parser;
use polystore::escmd::{run, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,polystore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("es-index: {}", error);
        std::process::exit(1);
    }
}
