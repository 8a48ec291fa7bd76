use std::{env, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tokio::{fs::File, io::BufReader};
use tokio_util::sync::CancellationToken;
use xcroach::{
    models::RawConfig,
    parser::parse_stream,
    reporter::{ConsoleReporter, FileReporter},
    runner::{PipelineError, PipelineRunner},
};

#[derive(Parser)]
#[command(author, version, about = "Build an iOS app with xcodebuild and package it as an .ipa")]
struct Cli {
    /// Path to the config file. Defaults to ./xcroach.toml if present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the build, report errors, and package the app on success.
    Build {
        /// Skip the packaging step.
        #[arg(long)]
        no_package: bool,
        /// Directory for build logs and reports.
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,
        /// Echo every line of build output.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Parse a saved build log and print its verdict.
    Parse {
        /// The captured xcodebuild output.
        log: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Build {
            no_package,
            log_dir,
            verbose,
        } => {
            let mut runner = PipelineRunner::new(cli.config.as_deref(), cwd)
                .await?
                .verbose(verbose);
            if no_package {
                runner = runner.without_package();
            }

            let token = CancellationToken::new();
            let ctrl_c = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("\n🛑 Interrupted, stopping build...");
                    ctrl_c.cancel();
                }
            });

            let report = match runner.run(token).await {
                Ok(report) => report,
                Err(err) => {
                    if let Some(aborted) = err.downcast_ref::<PipelineError>() {
                        let path = FileReporter::save_aborted(aborted, &log_dir).await?;
                        println!("📝 Partial log saved to {}", path.display());
                    }
                    return Err(err);
                }
            };
            ConsoleReporter::report(&report);

            let path = FileReporter::save(&report, &log_dir).await?;
            println!("📝 Report saved to {}", path.display());

            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Parse { log } => {
            let settings = RawConfig::load(cli.config.as_deref(), &cwd)
                .await?
                .compile()?;
            let file = File::open(&log)
                .await
                .map_err(|err| anyhow::anyhow!("Failed to open '{}': {err}", log.display()))?;

            let outcome = parse_stream(BufReader::new(file), settings.parser, &cwd).await?;
            ConsoleReporter::report_outcome(&outcome);

            if !outcome.verdict.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
