use std::fs;
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use fitfmt::{
    Category, Engine, EngineConfig, Invocation, InvocationResponse, Mode, Normalizer, StyleGuide,
    output,
};
use tracing::info;

use crate::file_store::JsonFileStore;
use crate::logging;
use crate::server::{self, AppState};

#[derive(Debug, Parser)]
#[command(
    name = "fitfmt",
    version,
    about = "Audit and repair workout and program descriptions"
)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Style guide file (JSON or YAML); the built-in guide when omitted
    #[arg(long, global = true)]
    pub style: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Report violations for one page of records (never writes)
    Audit(PageArgs),
    /// Repair one page of records and write the changes back
    Repair(RepairArgs),
    /// Normalize a single fragment from a file or stdin
    Normalize(NormalizeArgs),
    /// Print the category/format rule table and style guide as JSON
    Rules,
    /// Serve the invocation endpoint over HTTP
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct PageArgs {
    /// JSON file holding an array of records
    #[arg(long)]
    pub store: PathBuf,

    /// Records per page (default: 20)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Index of the first record of the page
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Process only this record id
    #[arg(long)]
    pub target: Option<String>,

    /// Only records of this category (e.g. STRENGTH, micro_workouts)
    #[arg(long)]
    pub category: Option<Category>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct RepairArgs {
    #[command(flatten)]
    pub page: PageArgs,

    /// Compute the report without writing anything
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Fragment file; stdin when omitted
    #[arg(long)]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// JSON file holding an array of records
    #[arg(long)]
    pub store: PathBuf,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, default_value_t = 8787)]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Parse arguments, set up logging and run the command, printing to stdout.
///
/// # Errors
///
/// Returns an error if the command fails.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let mut stdout = io::stdout().lock();
    execute(cli, &mut stdout).await
}

/// Run a parsed command, writing its output to `out`.
///
/// # Errors
///
/// Returns an error if the store or style guide cannot be loaded, the page
/// request is invalid, or writing fails.
pub async fn execute(cli: Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    let engine = build_engine(cli.style.as_deref())?;
    match cli.command {
        Command::Audit(args) => run_page(&engine, Mode::Audit, &args, false, out),
        Command::Repair(args) => run_page(&engine, Mode::Repair, &args.page, args.dry_run, out),
        Command::Normalize(args) => normalize(&engine, args.input.as_deref(), out),
        Command::Rules => output::write_json::<StyleGuide>(engine.guide(), out),
        Command::Serve(args) => {
            let store = JsonFileStore::open(&args.store)?;
            let state = AppState::new(engine, store);
            server::serve(state, SocketAddr::new(args.host, args.port), cli.verbose).await
        }
    }
}

/// Load a guide by file extension (`.yaml`/`.yml` or JSON).
fn load_style(path: &Path) -> anyhow::Result<StyleGuide> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read style guide {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let guide = if is_yaml {
        StyleGuide::from_yaml_str(&content)
    } else {
        StyleGuide::from_json_str(&content)
    };
    guide.with_context(|| format!("Invalid style guide {}", path.display()))
}

fn build_engine(style: Option<&Path>) -> anyhow::Result<Engine> {
    let guide = match style {
        Some(path) => load_style(path)?,
        None => StyleGuide::standard(),
    };
    Ok(Engine::new(Arc::new(guide), EngineConfig::default()))
}

fn run_page(
    engine: &Engine,
    mode: Mode,
    args: &PageArgs,
    dry_run: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut store = JsonFileStore::open(&args.store)?;
    let invocation = Invocation {
        mode,
        batch_size: args.batch_size,
        offset: Some(args.offset),
        target_id: args.target.clone(),
        category: args.category,
        dry_run,
    };
    let response = engine.invoke(&mut store, &invocation)?;

    if store.is_dirty() {
        store.save()?;
        info!(path = %store.path().display(), "store updated");
    }

    match (&response, args.output) {
        (_, OutputFormat::Json) => output::write_json(&response, out),
        (InvocationResponse::Audit(report), OutputFormat::Text) => {
            output::write_audit_human(report, out)
        }
        (InvocationResponse::Repair(report), OutputFormat::Text) => {
            output::write_repair_human(report, out)
        }
    }
}

fn normalize(engine: &Engine, input: Option<&Path>, out: &mut dyn Write) -> anyhow::Result<()> {
    let fragment = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let normalizer = Normalizer::new(Arc::clone(engine.guide()));
    writeln!(out, "{}", normalizer.normalize(&fragment))?;
    Ok(())
}
