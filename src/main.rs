use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cardinality_scan::cli::{Cli, Command, CountArgs, Format};
use cardinality_scan::generator::{self, GenerateOptions};
use cardinality_scan::{count_distinct, CancellationToken};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    let outcome = match cli.command {
        Command::Count(args) => cmd_count(&args),
        Command::Generate {
            path,
            size,
            distinct,
            seed,
        } => cmd_generate(
            &path,
            &GenerateOptions {
                size,
                distinct,
                seed,
            },
        ),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> Result<(), String> {
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).map_err(|e| format!("invalid log level: {e}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    match &cli.log_file {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| format!("failed to open log file {}: {e}", path.display()))?;
            builder.with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn cmd_count(args: &CountArgs) -> Result<(), String> {
    let config = args.scan_config()?;

    let cancel = CancellationToken::new();
    if let Some(secs) = args.timeout {
        let timeout =
            Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout: {e}"))?;
        cancel.cancel_after(timeout);
    }

    let report = count_distinct(&args.path, &config, &cancel)
        .map_err(|e| format!("{} failed: {e}", e.stage()))?;

    match args.format {
        Format::Text => println!("Total unique keys: {}", report.estimate),
        Format::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            println!("{json}");
        }
    }
    Ok(())
}

fn cmd_generate(path: &Path, options: &GenerateOptions) -> Result<(), String> {
    let stats = generator::generate(path, options)
        .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
    println!(
        "Wrote {} lines ({} bytes) to {}",
        stats.lines,
        stats.bytes,
        path.display()
    );
    Ok(())
}
