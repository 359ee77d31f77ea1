//! Command-line front end for corpus validation and parse-tree export.

use clap::{Args, Parser, Subcommand};
use sql_corpus_tools::{Config, CorpusValidator, Error, ExportStatus, Exporter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "sql-corpus",
    version,
    about = "Validate SQL corpora against a grammar and export parse trees."
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate every statement of every corpus file and write the ledgers.
    Validate {
        #[command(flatten)]
        common: CommonArgs,

        /// Statistics ledger path (defaults to OUTPUT_DIR/error_stats.csv).
        #[arg(long)]
        stats_ledger: Option<PathBuf>,

        /// Number of files validated concurrently.
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Per-statement timeout in seconds (0 disables it).
        #[arg(long)]
        statement_timeout: Option<u64>,
    },
    /// Parse every corpus file and write the parse trees as JSON.
    Export {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory for JSON documents (defaults to OUTPUT_DIR/json_trees).
        #[arg(long)]
        json_dir: Option<PathBuf>,

        /// Run summary ledger path (defaults to OUTPUT_DIR/export_summary.csv).
        #[arg(long)]
        summary_ledger: Option<PathBuf>,

        /// Timeout log path (defaults to OUTPUT_DIR/timeout_log.txt).
        #[arg(long)]
        timeout_log: Option<PathBuf>,

        /// Whole-file timeout in seconds (0 disables it).
        #[arg(long)]
        file_timeout: Option<u64>,

        /// Per-statement fallback timeout in seconds (0 disables it).
        #[arg(long)]
        statement_timeout: Option<u64>,
    },
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// JSON configuration file; command-line options take precedence.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Directory containing the corpus files.
    #[arg(long, short = 'i')]
    input_dir: Option<PathBuf>,

    /// Directory receiving the outputs.
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Grammar start rule.
    #[arg(long)]
    start_rule: Option<String>,

    /// Extension of corpus files, without the dot.
    #[arg(long)]
    extension: Option<String>,
}

impl CommonArgs {
    fn load(&self) -> Result<Config, Error> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => {
                let (Some(input), Some(output)) = (&self.input_dir, &self.output_dir) else {
                    return Err(Error::Config {
                        message: "--input-dir and --output-dir are required without --config"
                            .to_string(),
                    });
                };
                Config::new(input, output).with_env_overrides(|name| std::env::var(name).ok())
            }
        };
        if let Some(input) = &self.input_dir {
            config.input_dir.clone_from(input);
        }
        if let Some(output) = &self.output_dir {
            config.output_dir.clone_from(output);
        }
        if let Some(rule) = &self.start_rule {
            config.start_rule.clone_from(rule);
        }
        if let Some(extension) = &self.extension {
            config.extension.clone_from(extension);
        }
        Ok(config)
    }
}

fn run(args: CliArgs) -> Result<(), Error> {
    match args.command {
        Command::Validate {
            common,
            stats_ledger,
            jobs,
            statement_timeout,
        } => {
            let mut config = common.load()?;
            if let Some(path) = stats_ledger {
                config = config.with_stats_ledger(path);
            }
            if let Some(jobs) = jobs {
                config = config.with_jobs(jobs);
            }
            if let Some(secs) = statement_timeout {
                config = config.with_statement_timeout_secs(secs);
            }
            config.validate()?;

            let summary = CorpusValidator::new(&config).run()?;
            println!(
                "Validated {} files: {} statements, {} with errors, {} corrupted",
                summary.file_count(),
                summary.total_statements(),
                summary.total_failed(),
                summary.total_corrupted()
            );
            println!("Statistics: {}", config.stats_ledger_path().display());
            println!("Errors: {}", config.error_ledger_path().display());
        }
        Command::Export {
            common,
            json_dir,
            summary_ledger,
            timeout_log,
            file_timeout,
            statement_timeout,
        } => {
            let mut config = common.load()?;
            if let Some(path) = json_dir {
                config = config.with_json_dir(path);
            }
            if let Some(path) = summary_ledger {
                config = config.with_summary_ledger(path);
            }
            if let Some(path) = timeout_log {
                config = config.with_timeout_log(path);
            }
            if let Some(secs) = file_timeout {
                config = config.with_file_timeout_secs(secs);
            }
            if let Some(secs) = statement_timeout {
                config = config.with_statement_timeout_secs(secs);
            }
            config.validate()?;

            let summary = Exporter::new(&config).run()?;
            println!(
                "Exported {} files: {} complete, {} partial, {} failed",
                summary.records.len(),
                summary.count(ExportStatus::Success),
                summary.count(ExportStatus::Partial),
                summary.count(ExportStatus::CompleteFailure)
            );
            if !summary.timeout_log.is_empty() {
                println!("Timeouts and failures: {}", config.timeout_log_path().display());
            }
            println!("Summary: {}", config.summary_ledger_path().display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(CliArgs::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
