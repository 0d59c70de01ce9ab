//! lcamigrate CLI - migrate LCA activities between database versions

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use lcamigrate::config::{self, MigrateConfig};
use lcamigrate::migrate::{DuplicatePolicy, Resolution, TieBreak};
use lcamigrate::output::{emit_json, OutputFormat};
use lcamigrate::storage::{import_dump, SqliteStore, StoreDump, StoreHandle};
use lcamigrate::ui::{self, Icons};
use lcamigrate::{Migrator, ResolveOptions, Shape};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lcamigrate")]
#[command(version)]
#[command(about = "Resolve and recreate LCA activities across database versions")]
#[command(long_about = r#"
lcamigrate finds the counterpart of an activity of an old database in a
new one, by exact attributes or by fuzzy name matching, and can recreate
missing activities together with their whole supply chain.

Example usage:
  lcamigrate init
  lcamigrate import --file ecoinvent-3.8.json
  lcamigrate resolve --code 0a1b2c --fuzzy
  lcamigrate batch --file codes.txt --create
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = "lcamigrate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Matching flags shared by the resolving commands
#[derive(Args, Debug, Clone)]
struct MatchArgs {
    /// Fall back to fuzzy matching when no exact match exists
    #[arg(long)]
    fuzzy: bool,

    /// Minimum fuzzy score (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    cutoff: Option<u8>,

    /// Policy for equally good candidates
    #[arg(long, value_enum)]
    tie_break: Option<TieBreak>,

    /// What to do with repeated exchanges
    #[arg(long, value_enum)]
    duplicates: Option<DuplicatePolicy>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Load records and exchanges from a JSON dump
    Import {
        /// Dump file
        #[arg(short, long)]
        file: PathBuf,

        /// Database to import into (defaults to the target database)
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Resolve one source activity in the target store
    Resolve {
        /// Code of the source activity
        #[arg(long)]
        code: String,

        /// Treat --code as a full lca:// key
        #[arg(long)]
        by_key: bool,

        /// Create the activity when nothing matches
        #[arg(long)]
        create: bool,

        #[command(flatten)]
        matching: MatchArgs,

        /// Result shape
        #[arg(long, value_enum, default_value = "key")]
        shape: Shape,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a copy of a source activity without matching it first
    Create {
        /// Code of the source activity
        #[arg(long)]
        code: String,

        /// Treat --code as a full lca:// key
        #[arg(long)]
        by_key: bool,

        #[command(flatten)]
        matching: MatchArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Resolve every code listed in a file, in one transaction
    Batch {
        /// File with one code per line (`#` starts a comment)
        #[arg(short, long)]
        file: PathBuf,

        /// Create activities when nothing matches
        #[arg(long)]
        create: bool,

        #[command(flatten)]
        matching: MatchArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show record and exchange counts
    Stats {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Source and target databases, opened once when they are the same file
struct Backends {
    source: SqliteStore,
    target: Option<SqliteStore>,
}

impl Backends {
    fn open(config: &MigrateConfig) -> anyhow::Result<Self> {
        let source = open_database(Path::new(&config.source.database))?;
        let target = if config.shared_database() {
            None
        } else {
            Some(open_database(Path::new(&config.target.database))?)
        };
        Ok(Self { source, target })
    }

    fn source(&self) -> &SqliteStore {
        &self.source
    }

    fn target(&self) -> &SqliteStore {
        self.target.as_ref().unwrap_or(&self.source)
    }
}

fn open_database(path: &Path) -> anyhow::Result<SqliteStore> {
    config::ensure_db_dir(path)?;
    Ok(SqliteStore::open(path)?)
}

/// Handles for source, target and biosphere stores
struct Handles<'a> {
    source: StoreHandle<'a>,
    target: StoreHandle<'a>,
    biosphere: StoreHandle<'a>,
}

impl<'a> Handles<'a> {
    fn new(backends: &'a Backends, config: &MigrateConfig) -> Self {
        Self {
            source: StoreHandle::new(backends.source(), config.source.project.as_str(), config.source.store.as_str()),
            target: StoreHandle::new(backends.target(), config.target.project.as_str(), config.target.store.as_str()),
            biosphere: StoreHandle::new(
                backends.target(),
                config.target.project.as_str(),
                config.target.biosphere.as_str(),
            ),
        }
    }

    fn migrator(&self, config: &MigrateConfig) -> Migrator<'_> {
        Migrator::with_settings(&self.source, &self.target, &self.biosphere, config.settings())
    }
}

fn apply_match_args(config: &mut MigrateConfig, args: &MatchArgs) {
    if args.fuzzy {
        config.matching.fuzzy = true;
    }
    if let Some(cutoff) = args.cutoff {
        config.matching.fuzzy = true;
        config.matching.fuzzy_cutoff = cutoff;
    }
    if let Some(tie_break) = args.tie_break {
        config.matching.tie_break = tie_break;
    }
    if let Some(duplicates) = args.duplicates {
        config.matching.duplicates = duplicates;
    }
}

fn resolve_options(config: &MigrateConfig, by_key: bool, create: bool, shape: Shape) -> ResolveOptions {
    ResolveOptions {
        shape,
        create_if_not_found: create,
        by_key,
        fuzzy_match: config.matching.fuzzy,
        fuzzy_cutoff: config.matching.fuzzy_cutoff,
    }
}

fn read_codes(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn resolution_json(source: &str, res: &Resolution, shape: Shape) -> serde_json::Value {
    serde_json::json!({
        "source": source,
        "found": res.is_found(),
        "result": res.shaped(shape),
        "strategy": res.strategy(),
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = config::load_config(Some(&cli.config))?.unwrap_or_default();

    match cli.command {
        Commands::Init { force } => {
            let config = MigrateConfig::default();
            config::write_config(&cli.config, &config, force)?;
            ui::success(&format!("Wrote {}", cli.config.display()));
            ui::status(Icons::DATABASE, "Source", &format!("{}/{}", config.source.project, config.source.store));
            ui::status(Icons::DATABASE, "Target", &format!("{}/{}", config.target.project, config.target.store));
        }

        Commands::Import { file, database } => {
            let database = database.unwrap_or_else(|| PathBuf::from(&config.target.database));
            let store = open_database(&database)?;

            let spinner = ui::Spinner::new(&format!("Importing {}", file.display()));
            let dump = StoreDump::from_file(&file)?;
            let stats = import_dump(&store, &dump)?;
            spinner.finish_with_message("Done");

            ui::success(&format!("Imported into {}/{}", dump.project, dump.store));
            ui::summary_row("Records:", &stats.records.to_string());
            ui::summary_row("Exchanges:", &stats.exchanges.to_string());
            ui::status(Icons::DATABASE, "Database", &database.display().to_string());
        }

        Commands::Resolve {
            code,
            by_key,
            create,
            matching,
            shape,
            format,
        } => {
            apply_match_args(&mut config, &matching);
            let backends = Backends::open(&config)?;
            let handles = Handles::new(&backends, &config);
            let mut migrator = handles.migrator(&config);

            let opts = resolve_options(&config, by_key, create, shape);
            let res = backends.target().in_transaction(|| migrator.resolve(&code, &opts))?;

            match format {
                OutputFormat::Json => emit_json(&resolution_json(&code, &res, shape))?,
                OutputFormat::Text => {
                    ui::resolution(&code, &res);
                    println!("{}", res.shaped(shape));
                    if migrator.stats().created_records > 0 {
                        ui::info(
                            "Created",
                            &format!(
                                "{} records, {} exchanges",
                                migrator.stats().created_records,
                                migrator.stats().created_exchanges
                            ),
                        );
                    }
                }
            }
        }

        Commands::Create {
            code,
            by_key,
            matching,
            format,
        } => {
            apply_match_args(&mut config, &matching);
            let backends = Backends::open(&config)?;
            let handles = Handles::new(&backends, &config);
            let mut migrator = handles.migrator(&config);

            let opts = resolve_options(&config, by_key, true, Shape::Key);
            let res = backends
                .target()
                .in_transaction(|| migrator.create_if_not_found(&code, &opts))?;

            match format {
                OutputFormat::Json => emit_json(&serde_json::json!({
                    "resolution": resolution_json(&code, &res, Shape::Record),
                    "stats": migrator.stats(),
                }))?,
                OutputFormat::Text => {
                    ui::resolution(&code, &res);
                    print!("{}", migrator.stats());
                }
            }
        }

        Commands::Batch {
            file,
            create,
            matching,
            format,
        } => {
            apply_match_args(&mut config, &matching);
            let codes = read_codes(&file)?;
            if codes.is_empty() {
                ui::warn(&format!("No codes in {}", file.display()));
                return Ok(());
            }

            let backends = Backends::open(&config)?;
            let handles = Handles::new(&backends, &config);
            let mut migrator = handles.migrator(&config);
            let opts = resolve_options(&config, false, create, Shape::Key);

            if format == OutputFormat::Text {
                ui::header(&format!(
                    "Migrating {} activities: {}/{} -> {}/{}",
                    codes.len(),
                    config.source.project,
                    config.source.store,
                    config.target.project,
                    config.target.store
                ));
            }

            let start = Instant::now();
            let progress = ui::BatchProgress::new(codes.len());
            let mut results = Vec::with_capacity(codes.len());

            backends.target().begin_transaction()?;
            for code in &codes {
                progress.inc(code);
                match migrator.resolve(code, &opts) {
                    Ok(res) => results.push((code.as_str(), res)),
                    Err(e) => {
                        progress.abandon();
                        backends.target().rollback()?;
                        ui::error(&format!("{}: {}", code, e));
                        return Err(e.into());
                    }
                }
            }
            backends.target().commit()?;

            match format {
                OutputFormat::Json => {
                    let rows: Vec<_> = results
                        .iter()
                        .map(|(code, res)| resolution_json(code, res, Shape::Key))
                        .collect();
                    emit_json(&serde_json::json!({
                        "results": rows,
                        "stats": migrator.stats(),
                    }))?;
                }
                OutputFormat::Text => {
                    progress.finish_with_summary(start.elapsed(), results.len(), migrator.stats());
                    let rows: Vec<_> = results
                        .iter()
                        .map(|(code, res)| ui::BatchRow::new(code, res))
                        .collect();
                    ui::section("Results");
                    println!("{}", ui::results_table(&rows));
                    ui::section("Statistics");
                    print!("{}", migrator.stats());
                }
            }
        }

        Commands::Stats { format } => {
            let backends = Backends::open(&config)?;
            let mut databases = vec![("source", config.source.database.as_str(), backends.source().stats()?)];
            if !config.shared_database() {
                databases.push(("target", config.target.database.as_str(), backends.target().stats()?));
            }

            match format {
                OutputFormat::Json => {
                    let value: Vec<_> = databases
                        .iter()
                        .map(|(role, path, stats)| serde_json::json!({ "role": role, "path": path, "stats": stats }))
                        .collect();
                    emit_json(&value)?;
                }
                OutputFormat::Text => {
                    for (role, path, stats) in &databases {
                        ui::section(&format!("{} Database ({})", Icons::STATS, role));
                        ui::status(Icons::DATABASE, "Path", path);
                        println!(
                            "{}",
                            ui::stats_table(&[
                                ("Records", stats.records.to_string()),
                                ("Auto-generated", stats.auto_generated.to_string()),
                                ("Exchanges", stats.exchanges.to_string()),
                            ])
                        );

                        let mut stores = ui::TableBuilder::new();
                        for store in &stats.stores {
                            stores.add_row(
                                &format!("{}/{}", store.project, store.store),
                                &format!("{} ({} auto-generated)", store.records, store.auto_generated),
                            );
                        }
                        println!("{}", stores.build());
                    }
                }
            }
        }
    }

    Ok(())
}
