use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use shopping_reminder::model::SourceRecord;
use shopping_reminder::store::{SourceStore, SqliteSourceStore};

#[derive(Debug, Parser)]
#[command(author, version, about = "Manage reminder sources in the SQLite store")]
struct Args {
    /// SQLite URL of the source store
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every source, active or not
    List,
    /// Show one source
    Show { source_id: String },
    /// Register a new active source
    Add {
        #[arg(long)]
        name: String,
        /// Notion database queried for unchecked items
        #[arg(long)]
        database_id: String,
        /// Notion page receiving the reminder comment
        #[arg(long)]
        page_id: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Include a source in reminder runs again
    Activate { source_id: String },
    /// Exclude a source from reminder runs without deleting it
    Deactivate { source_id: String },
    /// Remove a source permanently
    Delete { source_id: String },
}

fn print_source(source: &SourceRecord) {
    println!(
        "{}  {:<8}  {}  db={} page={}{}",
        source.source_id,
        if source.is_active { "active" } else { "inactive" },
        source.display_name,
        source.database_id,
        source.page_id,
        source
            .description
            .as_deref()
            .map(|d| format!("  ({d})"))
            .unwrap_or_default()
    );
}

async fn set_active(store: &SqliteSourceStore, source_id: &str, active: bool) -> Result<()> {
    let mut source = store
        .get_source(source_id)
        .await?
        .ok_or_else(|| anyhow!("source {} not found", source_id))?;
    source.is_active = active;
    store.save_source(&source).await?;
    print_source(&source);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let store = SqliteSourceStore::open(&args.database_url).await?;

    match args.command {
        Command::List => {
            for source in store.list_sources().await? {
                print_source(&source);
            }
        }
        Command::Show { source_id } => {
            let source = store
                .get_source(&source_id)
                .await?
                .ok_or_else(|| anyhow!("source {} not found", source_id))?;
            println!("{}", serde_json::to_string_pretty(&source)?);
        }
        Command::Add {
            name,
            database_id,
            page_id,
            description,
        } => {
            let source = SourceRecord::create_new(name, database_id, page_id, description);
            store.save_source(&source).await?;
            print_source(&source);
        }
        Command::Activate { source_id } => set_active(&store, &source_id, true).await?,
        Command::Deactivate { source_id } => set_active(&store, &source_id, false).await?,
        Command::Delete { source_id } => {
            if !store.delete_source(&source_id).await? {
                return Err(anyhow!("source {} not found", source_id));
            }
            println!("deleted {}", source_id);
        }
    }
    Ok(())
}
