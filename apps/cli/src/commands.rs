//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use crewout_core::extractor::CrewOutputDocument;
use crewout_core::pipeline::{Pipeline, RunContext};
use crewout_core::run::persist_run;
use crewout_core::sample::{sample_execution_result, sample_raw_outputs};
use crewout_shared::{AppConfig, ExtractionConfig, init_config, load_config};
use crewout_storage::StorageManager;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// crewout: keep an audit trail of crew runs.
#[derive(Parser)]
#[command(
    name = "crewout",
    version,
    about = "Persist crew execution results as JSON and Markdown files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Persist a crew result document (JSON) as an execution folder.
    Save {
        /// Path to the crew result JSON.
        input: PathBuf,

        /// Which crew produced the result.
        #[arg(short, long, default_value = "daily-assistant")]
        pipeline: Pipeline,

        /// Folder name prefix (defaults to the pipeline's name).
        #[arg(short, long)]
        folder_name: Option<String>,

        /// Base output directory (defaults to config `output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Date recorded in the metadata (defaults to today).
        #[arg(long)]
        date: Option<String>,

        /// Model name for usage records that do not name one.
        #[arg(long, env = "CREWOUT_DEFAULT_MODEL")]
        model: Option<String>,
    },

    /// Write the built-in sample result.
    Sample {
        /// Base output directory (defaults to config `output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List persisted executions, newest first.
    List {
        /// Base output directory (defaults to config `output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "crewout=info",
        1 => "crewout=debug",
        _ => "crewout=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Save {
            input,
            pipeline,
            folder_name,
            out,
            date,
            model,
        } => cmd_save(SaveArgs {
            input,
            pipeline,
            folder_name,
            out,
            date,
            model,
        }),
        Command::Sample { out } => cmd_sample(out),
        Command::List { out } => cmd_list(out),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

struct SaveArgs {
    input: PathBuf,
    pipeline: Pipeline,
    folder_name: Option<String>,
    out: Option<PathBuf>,
    date: Option<String>,
    model: Option<String>,
}

/// Flag value, else the configured output directory.
fn output_dir(config: &AppConfig, out: Option<PathBuf>) -> PathBuf {
    out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir))
}

fn cmd_save(args: SaveArgs) -> Result<()> {
    let config = load_config()?;

    let document = CrewOutputDocument::from_path(&args.input)
        .wrap_err_with(|| format!("cannot load crew result from '{}'", args.input.display()))?;

    let mut extraction = ExtractionConfig::from(&config);
    if let Some(model) = args.model {
        extraction.default_model_name = model;
    }

    let mut context = match args.date {
        Some(date) => RunContext::new(date),
        None => RunContext::today(&config.defaults.date_format)?,
    };
    if let Some(name) = args.folder_name {
        context = context.with_folder_name(name);
    }

    let storage = StorageManager::new(output_dir(&config, args.out))?;

    info!(
        input = %args.input.display(),
        pipeline = %args.pipeline,
        "saving crew result"
    );

    let saved = persist_run(&storage, args.pipeline, &document, &extraction, &context)?;

    println!();
    println!("  Execution saved!");
    println!("  ID:      {}", saved.execution_id);
    println!("  Status:  {}", saved.status);
    println!("  Stages:  {}", saved.stages_saved.join(", "));
    if let Some(report) = &saved.report_path {
        println!("  Report:  {}", report.display());
    }
    println!("  Path:    {}", saved.folder.display());
    println!("  Time:    {:.2}s", saved.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_sample(out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = StorageManager::new(output_dir(&config, out))?;

    let result = sample_execution_result();
    let folder = storage.save_crew_execution_result(
        Pipeline::DailyAssistant.folder_name(),
        &result,
        Some(&sample_raw_outputs()),
    )?;

    println!("Sample execution saved to: {}", folder.display());
    Ok(())
}

fn cmd_list(out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let base = output_dir(&config, out);
    if !base.is_dir() {
        return Err(eyre!("output directory '{}' does not exist", base.display()));
    }

    let storage = StorageManager::new(base)?;
    let executions = storage.list_executions()?;

    if executions.is_empty() {
        println!("No executions found in {}", storage.base_dir().display());
        return Ok(());
    }

    for exec in &executions {
        println!(
            "{:<36}  {:<25}  {:<20}  {:<8}  {}",
            exec.execution_id,
            exec.timestamp.as_deref().unwrap_or("-"),
            exec.agent_name.as_deref().unwrap_or("-"),
            exec.status.as_deref().unwrap_or("-"),
            exec.path.display()
        );
    }
    println!();
    println!("{} execution(s)", executions.len());

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
