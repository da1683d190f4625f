use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

// Import from spellpipe-core
use spellpipe_core::{BinaryPolicy, RunOptions, SpellingConfig, TaskReport, TaskRunner};

// Import CLI utilities
use spellpipe::report::{any_failure, render_json, render_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BinaryArg {
    Legacy,
    Skip,
    Check,
}

impl From<BinaryArg> for BinaryPolicy {
    fn from(arg: BinaryArg) -> Self {
        match arg {
            BinaryArg::Legacy => BinaryPolicy::Legacy,
            BinaryArg::Skip => BinaryPolicy::Skip,
            BinaryArg::Check => BinaryPolicy::Check,
        }
    }
}

#[derive(Parser)]
#[command(name = "spellpipe")]
#[command(about = "Spell check source code, markup and office documents through filter pipelines")]
struct Args {
    /// Path to config file (default: .spellpipe.yml, .spellpipe.yaml, spellpipe.yml or spellpipe.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run only the named task (repeatable)
    #[arg(short, long = "name")]
    names: Vec<String>,

    /// Run only tasks in this group (repeatable)
    #[arg(short, long = "group")]
    groups: Vec<String>,

    /// What to do with binary content that reaches the spell checker
    #[arg(short, long, value_enum, default_value = "legacy")]
    binary_content: BinaryArg,

    /// Spell checker to use instead of the configured one: aspell or hunspell
    #[arg(short, long)]
    spellchecker: Option<String>,

    /// Check these sources instead of each task's own (repeatable)
    #[arg(short = 'S', long = "source")]
    sources: Vec<String>,

    /// Worker threads per task
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Show full error details for failed stages
    #[arg(short, long)]
    debug: bool,

    /// Reuse existing dictionaries instead of compiling them
    #[arg(short = 'x', long)]
    skip_dict_compile: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

fn init_logging(verbose: u8) -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Reports own stdout; diagnostics go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}

fn load_config(args: &Args) -> Result<SpellingConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => SpellingConfig::find_default(".").ok_or_else(|| {
            anyhow!("No configuration file found (looked for .spellpipe.yml, .spellpipe.yaml, spellpipe.yml, spellpipe.yaml)")
        })?,
    };
    let config = SpellingConfig::load_from_file(&path)
        .map_err(|e| anyhow!("Failed to load {}: {}", path.display(), e))?;
    tracing::info!("Loaded config from: {}", path.display());
    Ok(config)
}

fn run(args: &Args) -> Result<Vec<TaskReport>> {
    let config = load_config(args)?;
    let options = RunOptions {
        names: args.names.clone(),
        groups: args.groups.clone(),
        binary_content: args.binary_content.into(),
        spellchecker: args.spellchecker.clone(),
        jobs: args.jobs,
        debug: args.debug,
        skip_dict_compile: args.skip_dict_compile,
        sources: args.sources.clone(),
        root: PathBuf::new(),
    };
    if options.jobs == Some(0) {
        return Err(anyhow!("--jobs must be at least 1"));
    }
    Ok(TaskRunner::new(config, options).run()?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let reports = match run(&args) {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&reports)),
        OutputFormat::Json => println!("{}", render_json(&reports)?),
    }

    if any_failure(&reports) {
        std::process::exit(1);
    }
    Ok(())
}
