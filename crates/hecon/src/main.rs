use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hecon::commands::{default_data_dir, load_study, summarize_study};
use hecon::{Analysis, OutputFormat, RunOptions, execute, init_logging};

#[derive(Parser, Debug)]
#[command(name = "hecon")]
#[command(about = "Cost-effectiveness analysis of decision tree, Markov and partitioned survival models")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Report format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Write logs to {log_dir}/hecon.log instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Path to the data directory for projects (default: ~/.hecon/)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a study file and print what it contains
    Validate { study: PathBuf },
    /// Base case: strategy outcomes, dominance and ICERs
    Evaluate(RunArgs),
    /// One-way sensitivity analysis (tornado)
    Dsa(RunArgs),
    /// Probabilistic sensitivity analysis with acceptability curve
    Psa(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Study file (YAML or JSON)
    study: PathBuf,

    /// Project whose stored parameters are used and where results are saved
    #[arg(short, long)]
    project: Option<String>,

    /// Willingness-to-pay threshold per unit of effect
    #[arg(long)]
    wtp: Option<f64>,

    /// Number of PSA draws
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// PSA seed
    #[arg(long)]
    seed: Option<u64>,

    /// Stop sensitivity runs after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl RunArgs {
    fn options(&self) -> RunOptions {
        RunOptions {
            project: self.project.clone(),
            wtp: self.wtp,
            iterations: self.iterations,
            seed: self.seed,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(args.log_dir.as_deref(), &args.log_level)?;
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);

    let (run, analysis) = match &args.command {
        Command::Validate { study } => {
            let summary = summarize_study(&load_study(study)?)?;
            let text = match args.format {
                OutputFormat::Json => serde_json::to_string_pretty(&summary)?,
                OutputFormat::Yaml => serde_saphyr::to_string(&summary)
                    .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize summary: {e}"))?,
            };
            println!("{text}");
            return Ok(());
        }
        Command::Evaluate(run) => (run, Analysis::BaseCase),
        Command::Dsa(run) => (run, Analysis::Dsa),
        Command::Psa(run) => (run, Analysis::Psa),
    };

    let report = execute(&run.study, analysis, &run.options(), &data_dir)?;
    println!("{}", report.render(args.format)?);

    tracing::info!("hecon finished");
    Ok(())
}
