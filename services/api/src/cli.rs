use crate::report::{run_score_report, ScoreArgs};
use crate::server;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use vaultra::app::Application;
use vaultra::config::AppConfig;
use vaultra::error::AppError;
use vaultra::jobs::JobKind;
use vaultra::store::MemoryStore;
use vaultra::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "Vaultra",
    about = "Serve and operate the Vaultra funding readiness pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run pipeline jobs on demand
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
    /// Score a charge CSV export offline and print the readiness report
    Score(ScoreArgs),
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
    /// Run a single tick of one job and print its report
    Run(JobRunArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve the API without starting the periodic jobs
    #[arg(long)]
    pub(crate) no_scheduler: bool,
}

#[derive(Args, Debug)]
struct JobRunArgs {
    /// One of: sync, metrics, readiness, recommendations
    #[arg(value_parser = crate::infra::parse_job)]
    job: JobKind,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Jobs {
            command: JobsCommand::Run(args),
        } => run_job(args.job).await,
        Command::Score(args) => run_score_report(args),
    }
}

async fn run_job(job: JobKind) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let application = Application::from_config(&config, Arc::new(MemoryStore::default()))?;
    let report = application.orchestrator.run_tick(job, Utc::now()).await?;

    println!(
        "{}: {} processed, {} failed, {} skipped",
        report.job, report.processed, report.failed, report.skipped
    );
    Ok(())
}
