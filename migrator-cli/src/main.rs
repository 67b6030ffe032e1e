//! Migration CLI Tool
//!
//! Command-line interface for applying, reverting, and inspecting file-based
//! SQL migrations. Suitable for interactive use and CI/CD pipelines (`-s`).

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use migrator::connection;
use migrator::migration::{Confirm, Direction, LineConfirm, MigrationError, Migrator, RunOutcome};
use migrator::{MigratorConfig, SqlExecutor};
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "migrate")]
#[command(about = "Linear, file-based SQL migrations")]
#[command(version = "0.1.0")]
struct Cli {
    /// Database connection URL (falls back to config/migrator.toml, then DATABASE_URL)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Migrations directory path
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Bookkeeping table name
    #[arg(long, global = true)]
    table: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Apply migrations up to a version (default: the latest)
    Up {
        target: Option<i64>,

        /// Skip the preview and confirmation
        #[arg(short = 's', long)]
        skip_preview: bool,
    },

    /// Revert migrations down to a version (default: 0, everything)
    Down {
        target: Option<i64>,

        /// Skip the preview and confirmation
        #[arg(short = 's', long)]
        skip_preview: bool,
    },

    /// Show migration status (applied vs pending)
    Status,

    /// List installed migrations
    List,

    /// Create the bookkeeping table
    Install,

    /// Run SQL files in a single transaction without recording them
    Apply {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Create an empty up/down pair at the next version
    Make {
        /// Migration slug (e.g. "create-users")
        slug: String,
    },

    /// Drop a schema and everything in it
    Wipe {
        schema: String,

        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .init();

    match run(&cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            match e.downcast_ref::<MigrationError>() {
                Some(MigrationError::BookkeepingTableMissing { .. }) => {
                    eprintln!("{}", e.to_string().yellow())
                }
                _ => eprintln!("{} {:#}", "Error:".red().bold(), e),
            }
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = MigratorConfig::load().context("Failed to load configuration")?;
    if let Some(dir) = &cli.migrations_dir {
        config.migrations_dir = dir.clone();
    }
    if let Some(table) = &cli.table {
        config.table = table.clone();
    }
    log::debug!(
        "migrations in {}, bookkeeping table `{}`",
        config.migrations_dir.display(),
        config.table
    );
    let migrator = Migrator::from_config(&config);

    // `make` works on the directory alone
    if let Commands::Make { slug } = &cli.command {
        return handle_make(&migrator, slug);
    }

    let database_url = config.resolve_database_url(cli.db.as_deref()).ok_or_else(|| {
        anyhow!(
            "Database URL not provided. Use --db, set database_url in config/migrator.toml, \
             or set DATABASE_URL."
        )
    })?;
    let source = if cli.db.is_some() {
        "--db"
    } else if config.database_url.is_some() {
        "configuration"
    } else {
        "DATABASE_URL"
    };
    log::debug!("database URL taken from {source}");
    let executor = connection::open(&database_url).context("Error connecting to database")?;
    let executor = executor.as_ref();

    match &cli.command {
        Commands::Up {
            target,
            skip_preview,
        } => handle_migrate(&migrator, executor, Direction::Up, *target, *skip_preview),
        Commands::Down {
            target,
            skip_preview,
        } => handle_migrate(&migrator, executor, Direction::Down, *target, *skip_preview),
        Commands::Status => handle_status(&migrator, executor),
        Commands::List => handle_list(&migrator, executor),
        Commands::Install => handle_install(&migrator, executor),
        Commands::Apply { files } => handle_apply(&migrator, executor, files),
        Commands::Wipe { schema, yes } => handle_wipe(&migrator, executor, schema, *yes),
        Commands::Make { .. } => Ok(()),
    }
}

fn stdin_confirm() -> impl Confirm {
    LineConfirm::new(io::stdin().lock(), io::stdout())
}

fn handle_migrate(
    migrator: &Migrator,
    executor: &dyn SqlExecutor,
    direction: Direction,
    target: Option<i64>,
    skip_preview: bool,
) -> anyhow::Result<()> {
    let mut confirm = stdin_confirm();
    let confirm: Option<&mut dyn Confirm> = if skip_preview {
        None
    } else {
        Some(&mut confirm)
    };

    match migrator.migrate(executor, direction, target, confirm)? {
        RunOutcome::Aborted => println!("{}", "Action canceled.".yellow()),
        RunOutcome::Completed(steps) if steps.is_empty() => println!("Nothing to do."),
        RunOutcome::Completed(steps) => {
            for step in &steps {
                println!("  {} {}", "✓".green(), step);
            }
            let summary = format!("Brought {} {} migration(s).", direction, steps.len());
            println!("{}", summary.green());
        }
    }
    Ok(())
}

fn handle_status(migrator: &Migrator, executor: &dyn SqlExecutor) -> anyhow::Result<()> {
    let status = migrator.status(executor)?;

    println!("\n{}\n", "Migration Status".bold());

    if !status.installed {
        println!(
            "{}",
            format!(
                "Bookkeeping table `{}` is not installed. Run `migrate install` to create it.",
                migrator.table()
            )
            .yellow()
        );
        println!("Known migrations: {}", status.max_known);
        return Ok(());
    }

    println!("Current version: {}", status.current_version);
    println!("Latest known version: {}", status.max_known);
    println!();

    if status.applied.is_empty() {
        println!("Applied Migrations: None");
    } else {
        println!("Applied Migrations ({}):", status.applied.len());
        for record in &status.applied {
            let marker = if status.modified.contains(&record.version) {
                " (modified on disk)".yellow().to_string()
            } else {
                String::new()
            };
            println!("  {} {}.{}{}", "✓".green(), record.version, record.tag, marker);
        }
    }

    println!();

    if status.pending.is_empty() {
        println!("Pending Migrations: None");
    } else {
        println!("Pending Migrations ({}):", status.pending.len());
        for file in &status.pending {
            println!("  {} {}", "…".yellow(), file.file_name());
        }
    }

    Ok(())
}

fn handle_list(migrator: &Migrator, executor: &dyn SqlExecutor) -> anyhow::Result<()> {
    let records = migrator.list(executor)?;
    if records.is_empty() {
        println!("No migrations installed.");
    }
    for record in records {
        println!("{}.{}", record.version, record.tag);
    }
    Ok(())
}

fn handle_install(migrator: &Migrator, executor: &dyn SqlExecutor) -> anyhow::Result<()> {
    migrator.install(executor)?;
    println!(
        "{}",
        format!("Bookkeeping table `{}` installed.", migrator.table()).green()
    );
    Ok(())
}

fn handle_apply(
    migrator: &Migrator,
    executor: &dyn SqlExecutor,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    let count = migrator.apply_files(executor, files)?;
    println!("{}", format!("Applied {count} file(s).").green());
    Ok(())
}

fn handle_make(migrator: &Migrator, slug: &str) -> anyhow::Result<()> {
    let (up, down) = migrator.repository().create(slug)?;
    println!("{} {}", "Created".green(), up.display());
    println!("{} {}", "Created".green(), down.display());
    Ok(())
}

fn handle_wipe(
    migrator: &Migrator,
    executor: &dyn SqlExecutor,
    schema: &str,
    yes: bool,
) -> anyhow::Result<()> {
    if !yes {
        let prompt = format!("WARNING! This drops schema `{schema}` and everything in it.\n");
        if !stdin_confirm().confirm(&prompt.red().bold().to_string())? {
            println!("{}", "Action canceled.".yellow());
            return Ok(());
        }
    }
    migrator.wipe_schema(executor, schema)?;
    println!("{}", format!("Schema `{schema}` wiped.").green());
    Ok(())
}
