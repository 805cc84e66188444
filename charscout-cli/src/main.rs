use charscout::{
    config::{ScanConfig, ScanOverrides},
    input::{load_buffer, parse_target},
    ScanController, ScanError,
};
use clap::Parser;
use colored::Colorize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, ScanError>;

/// Count how many times a byte appears in a file, splitting the work across parallel
/// workers. Press Ctrl+C during a scan to see how many workers are still running.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to scan
    input: PathBuf,

    /// File the result line is written to (truncated)
    output: PathBuf,

    /// The single character to count
    target: String,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of workers (overrides P and config files)
    #[arg(short = 'j', long, allow_negative_numbers = true)]
    workers: Option<i64>,

    /// How long to wait for each worker's result (e.g. 5s, 500ms)
    #[arg(short, long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Delay after every scanned byte, to make long scans observable (e.g. 100ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pace: Option<Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let target = parse_target(&cli.target)?;
    let config = ScanConfig::load_from(cli.config.as_deref())?.merge_with_cli(ScanOverrides {
        worker_count: cli.workers,
        channel_timeout: cli.timeout,
        worker_pacing: cli.pace,
        log_level: cli.log_level,
    });
    init_logging(&config.log_level);
    debug!(?config, "resolved configuration");

    let buffer = load_buffer(&cli.input)?;
    print_step(1, "File opened successfully");
    print_step(2, &format!("File read successfully ({} bytes)", buffer.len()));

    let mut controller = ScanController::new(&config)?;
    println!(
        "Using {} workers for searching.",
        controller.worker_count().to_string().cyan()
    );

    let outcome = controller.scan(buffer, target)?;
    for warning in &outcome.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
    print_step(
        3,
        &format!(
            "Character counted successfully: total {} occurrences of character '{}'",
            outcome.total,
            target.escape_ascii()
        ),
    );

    fs::write(&cli.output, outcome.summary_line(&cli.input))
        .map_err(|e| ScanError::from_io(&cli.output, e))?;
    print_step(4, "Result written successfully");

    println!("{}", "All done!".green());
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_step(step: u8, message: &str) {
    println!("{} -> {}", format!("{}/4", step).green(), message);
}
