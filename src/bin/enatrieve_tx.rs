use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use enatrieve_tx::app::{App, CheckOptions, FetchOptions, TracingSink};
use enatrieve_tx::client::EnaHttpClient;
use enatrieve_tx::config::{ConfigLoader, ResolvedConfig};
use enatrieve_tx::domain::{OutputFormat, OutputTarget, TaxOperator};
use enatrieve_tx::error::EnaError;
use enatrieve_tx::output::print_json;
use enatrieve_tx::summary::{SummaryOutcome, select_renderer};

#[derive(Parser)]
#[command(name = "enatrieve-tx")]
#[command(about = "Fetch ENA sequencing-run metadata for a taxonomy id and summarize it")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (default: ./enatrieve.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log file path (default: logs/enatrieve_tx_<timestamp>.log); pass "" to disable
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Query ENA and write the run metadata to a file or stdout")]
    Fetch(FetchArgs),
    #[command(about = "Print the metadata summary for an existing TSV or JSON file")]
    Summary(SummaryArgs),
    #[command(about = "Run live smoke checks against the ENA portal")]
    Check(CheckArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// NCBI taxonomy identifier
    #[arg(long = "tax-id", alias = "tax_id")]
    tax_id: String,

    /// Output file path; "-" writes to stdout
    #[arg(long)]
    output: Option<String>,

    /// Maximum number of records (0 = no limit)
    #[arg(long)]
    limit: Option<u64>,

    /// Library strategy filter (default RNA-Seq)
    #[arg(long)]
    strategy: Option<String>,

    /// Match only the exact taxon instead of its subtree
    #[arg(long)]
    exact: bool,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    #[arg(long)]
    no_summary: bool,
}

#[derive(Args)]
struct SummaryArgs {
    path: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    format: OutputFormat,

    /// Also print the counts as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckArgs {
    #[arg(long = "tax-id", alias = "tax_id", default_value = "7460")]
    tax_id: String,

    #[arg(long, default_value_t = 5)]
    limit: u64,

    /// Print the check report as JSON instead of the step log
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<EnaError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EnaError) -> u8 {
    match error {
        EnaError::ConfigRead(_)
        | EnaError::ConfigParse(_)
        | EnaError::InvalidOperator(_)
        | EnaError::InvalidFormat(_) => 2,
        EnaError::EnaHttp(_) | EnaError::EnaStatus { .. } | EnaError::Stream(_) => 3,
        EnaError::CheckFailed(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let log_path = init_logging(cli.log.as_deref())?;
    if let Some(path) = log_path {
        tracing::info!("logging to file: {}", path.display());
    }

    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch(args) => run_fetch(args, resolved),
        Commands::Summary(args) => run_summary(args, resolved),
        Commands::Check(args) => run_check(args, resolved),
    }
}

fn init_logging(log: Option<&str>) -> miette::Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(io::stderr);

    let log_path = match log {
        Some("") => None,
        Some(path) => Some(PathBuf::from(path)),
        None => {
            let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
            Some(PathBuf::from(format!("logs/enatrieve_tx_{timestamp}.log")))
        }
    };

    let file_layer = match &log_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).into_diagnostic()?;
            }
            let file = File::create(path).into_diagnostic()?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(log_path
        .map(|path| std::path::absolute(&path).unwrap_or(path)))
}

fn run_fetch(args: FetchArgs, resolved: ResolvedConfig) -> miette::Result<()> {
    let client = EnaHttpClient::with_policy(&resolved.base_url, resolved.retry.clone())?;
    let app = App::new(client, select_renderer());

    let format = args.format.unwrap_or(resolved.format);
    let target = match args.output.as_deref() {
        Some(output) => output.parse::<OutputTarget>()?,
        None => OutputTarget::default_for(&args.tax_id, format),
    };
    let options = FetchOptions {
        tax_id: args.tax_id,
        strategy: args.strategy.unwrap_or(resolved.strategy),
        operator: TaxOperator::from_exact_flag(args.exact),
        limit: args.limit.unwrap_or(resolved.limit),
        format,
        target,
        summary: !args.no_summary,
    };

    app.fetch(options, &TracingSink)?;
    Ok(())
}

fn run_summary(args: SummaryArgs, resolved: ResolvedConfig) -> miette::Result<()> {
    let client = EnaHttpClient::with_policy(&resolved.base_url, resolved.retry)?;
    let app = App::new(client, select_renderer());
    let outcome = app.summarize(&Utf8PathBuf::from(args.path), args.format, &TracingSink);
    if args.json {
        if let SummaryOutcome::Rendered(stats) = outcome {
            print_json(&stats)?;
        }
    }
    Ok(())
}

fn run_check(args: CheckArgs, resolved: ResolvedConfig) -> miette::Result<()> {
    let client = EnaHttpClient::with_policy(&resolved.base_url, resolved.retry)?;
    let app = App::new(client, select_renderer());
    let options = CheckOptions {
        tax_id: args.tax_id,
        limit: args.limit,
    };
    if args.json {
        let report = app.check(options, &mut io::sink(), &TracingSink)?;
        print_json(&report)?;
    } else {
        app.check(options, &mut io::stdout(), &TracingSink)?;
    }
    Ok(())
}
