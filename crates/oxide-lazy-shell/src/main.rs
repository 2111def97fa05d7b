//! oxide-lazy-shell CLI
//!
//! Loads record types from a JSON settings file and runs accessor operations
//! against a SQLite database.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_lazy_orm::{Settings, SqliteDatabase};

use crate::commands::QueryOptions;

/// Query and edit records declared in a settings file.
#[derive(Parser)]
#[command(name = "oxide-lazy-shell")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// JSON file declaring the record types.
    #[arg(short, long, default_value = "models.json")]
    schema: PathBuf,

    /// Enable verbose output (logs every statement).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tables of every declared record type.
    Init,

    /// List the declared record types.
    Models,

    /// List records matching the filters.
    Query {
        /// Record type name.
        model: String,

        /// Filters as `field[__lookup]=value`.
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Ordering fields, `-` prefix for descending.
        #[arg(short, long, allow_hyphen_values = true)]
        order_by: Vec<String>,

        /// Rows to skip.
        #[arg(long)]
        offset: Option<usize>,

        /// Maximum number of rows.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the fetched rows in reverse.
        #[arg(short, long)]
        reverse: bool,
    },

    /// Count records matching the filters.
    Count {
        /// Record type name.
        model: String,

        /// Filters as `field[__lookup]=value`.
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },

    /// Fetch exactly one record.
    Get {
        /// Record type name.
        model: String,

        /// Filters as `field[__lookup]=value`.
        filters: Vec<String>,
    },

    /// Insert a record.
    Create {
        /// Record type name.
        model: String,

        /// Values as `field=value`.
        values: Vec<String>,
    },

    /// Delete a record by id.
    Delete {
        /// Record type name.
        model: String,

        /// Identity of the record.
        id: i64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = Settings::from_file(&cli.schema)
        .and_then(Settings::into_registry)
        .with_context(|| format!("loading {}", cli.schema.display()))?;
    debug!(models = ?registry.names(), "Loaded record types");

    if let Commands::Models = cli.command {
        for line in commands::models(&registry) {
            println!("{line}");
        }
        return Ok(());
    }

    let mut db = SqliteDatabase::connect(&cli.database)
        .with_context(|| format!("opening {}", cli.database))?;

    match cli.command {
        Commands::Init => {
            for line in commands::init(&registry, &mut db)? {
                println!("{line}");
            }
        }

        Commands::Models => {}

        Commands::Query {
            model,
            filters,
            order_by,
            offset,
            limit,
            reverse,
        } => {
            let options = QueryOptions {
                filters,
                order_by,
                offset,
                limit,
                reverse,
            };
            for line in commands::query(&registry, &mut db, &model, options)? {
                println!("{line}");
            }
        }

        Commands::Count { model, filters } => {
            println!("{}", commands::count(&registry, &mut db, &model, &filters)?);
        }

        Commands::Get { model, filters } => {
            println!("{}", commands::get(&registry, &mut db, &model, &filters)?);
        }

        Commands::Create { model, values } => {
            println!("{}", commands::create(&registry, &mut db, &model, &values)?);
        }

        Commands::Delete { model, id } => {
            println!("{}", commands::delete(&registry, &mut db, &model, id)?);
        }
    }

    db.close()?;
    Ok(())
}
