use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use stack_backup::config::{self, BackupConfig, RawConfig, Secret, SweepPhase};
use stack_backup::jobs::{JobSpec, RunTimestamp, Service};
use stack_backup::managers::backup::{BackupOrchestrator, JobOutcome, RunReport};
use stack_backup::managers::logging::{self, LoggingConfig};
use stack_backup::managers::retention::RetentionSweeper;
use stack_backup::utils::RealDockerOps;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stack-backup")]
#[command(about = "Backup orchestration for a containerized application stack", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (instead of the setting flags)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    settings: SettingFlags,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings given directly on the command line
#[derive(Args)]
struct SettingFlags {
    /// Directory receiving archives, dumps and job logs
    #[arg(long, conflicts_with = "config")]
    backup_dir: Option<PathBuf>,

    /// Issue tracker container
    #[arg(long, conflicts_with = "config")]
    issue_tracker_container: Option<String>,

    /// Wiki container
    #[arg(long, conflicts_with = "config")]
    wiki_container: Option<String>,

    /// Code host container
    #[arg(long, conflicts_with = "config")]
    code_host_container: Option<String>,

    /// Identity service container
    #[arg(long, conflicts_with = "config")]
    identity_service_container: Option<String>,

    /// Password for the database dumps
    #[arg(long, conflicts_with = "config")]
    database_password: Option<String>,

    /// Database server host name
    #[arg(long, conflicts_with = "config")]
    database_host: Option<String>,

    /// Container network the database jobs join
    #[arg(long, conflicts_with = "config")]
    network_name: Option<String>,

    /// Age in days after which artifacts are removed
    #[arg(long, conflicts_with = "config")]
    retention_days: Option<u32>,

    /// Installed identity service version
    #[arg(long, conflicts_with = "config")]
    identity_service_version: Option<String>,

    /// Image for filesystem archive jobs
    #[arg(long, conflicts_with = "config")]
    filesystem_image: Option<String>,

    /// Image for database dump jobs
    #[arg(long, conflicts_with = "config")]
    database_image: Option<String>,

    /// Per-job timeout in seconds
    #[arg(long, conflicts_with = "config")]
    job_timeout_seconds: Option<u64>,

    /// Run the retention sweep before or after the backup jobs
    #[arg(long, value_enum, conflicts_with = "config")]
    sweep_phase: Option<SweepPhase>,

    /// Log level (trace, debug, info, warning, error, critical)
    #[arg(long, conflicts_with = "config")]
    log_level: Option<String>,

    /// Directory for the rotating log file
    #[arg(long, conflicts_with = "config")]
    log_directory: Option<PathBuf>,

    /// Number of daily log files to keep
    #[arg(long, conflicts_with = "config")]
    log_max_files: Option<u32>,
}

impl SettingFlags {
    fn into_raw(self) -> RawConfig {
        let mut raw = RawConfig {
            backup_dir: self.backup_dir,
            database_password: self.database_password.map(Secret::new),
            database_host: self.database_host,
            network_name: self.network_name,
            retention_days: self.retention_days,
            identity_service_version: self.identity_service_version,
            filesystem_image: self.filesystem_image,
            database_image: self.database_image,
            job_timeout_seconds: self.job_timeout_seconds,
            sweep_phase: self.sweep_phase,
            log_level: self.log_level,
            log_directory: self.log_directory,
            log_max_files: self.log_max_files,
            ..Default::default()
        };

        let containers = [
            (Service::IssueTracker, self.issue_tracker_container),
            (Service::Wiki, self.wiki_container),
            (Service::CodeHost, self.code_host_container),
            (Service::IdentityService, self.identity_service_container),
        ];
        for (service, container) in containers {
            if let Some(container) = container {
                raw.containers.insert(service, container);
            }
        }

        raw
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the retention sweep and back up every configured service
    Run {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove expired backup artifacts only
    Sweep,

    /// Validate configuration
    Validate,

    /// List configured services and the artifacts a run would produce
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let code = execute(cli)?;
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}

/// Dispatch a command; returns the process exit code
fn execute(cli: Cli) -> Result<i32> {
    let command = cli.command.unwrap_or(Commands::Run { json: false });

    let raw = match cli.config {
        Some(path) => config::load_config(&path)?,
        None => cli.settings.into_raw(),
    };
    let config = raw.resolve()?;

    match command {
        // Commands that run no jobs use simple console logging
        Commands::Validate => {
            logging::init_console_logging();
            print_validation(&config);
            Ok(0)
        }

        Commands::List => {
            logging::init_console_logging();
            print_services(&config);
            Ok(0)
        }

        Commands::Sweep => {
            let _log_guard = logging::init_logging(&LoggingConfig::from_settings(&config.logging))?;

            match RetentionSweeper::from_config(&config).sweep() {
                Ok(summary) => {
                    println!("✓ {} expired file(s) removed", summary.count_removed());
                    for path in &summary.failed {
                        eprintln!("  ✗ Could not remove {}", path.display());
                    }
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("✗ Sweep failed: {}", e);
                    Ok(1)
                }
            }
        }

        Commands::Run { json } => {
            let _log_guard = logging::init_logging(&LoggingConfig::from_settings(&config.logging))?;

            let ops = RealDockerOps::new()?;
            let orchestrator = BackupOrchestrator::new(config, ops);
            let report = orchestrator.run()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            Ok(report.exit_code())
        }
    }
}

fn print_validation(config: &BackupConfig) {
    println!("Configuration is valid!");
    println!("Backup directory: {}", config.backup_dir.display());
    println!("Services: {}", config.services().len());
    println!("Retention: {} days (sweep {:?})", config.retention_days, config.sweep_phase);
    println!("Job timeout: {} seconds", config.job_timeout.as_secs());
    println!(
        "Network: {}",
        config.network_name.as_deref().unwrap_or("(default)")
    );
    println!(
        "Logs: {} (keeping {} files)",
        config.logging.directory.display(),
        config.logging.max_files
    );
}

fn print_services(config: &BackupConfig) {
    let timestamp = RunTimestamp::now();

    println!("Configured services (in backup order):");
    for service in config.services() {
        println!("  {}", service.name);
        println!("    Container: {}", service.container);
        println!("    Home: {}", service.home_path);
        if let Some(ref install) = service.install_path {
            println!("    Install: {}", install);
        }

        let filesystem = JobSpec::filesystem(&service, config, &timestamp);
        let database = JobSpec::database(&service, config, &timestamp);
        for job in std::iter::once(&filesystem).chain(database.as_ref()) {
            println!("    {} job:", job.kind);
            for artifact in &job.artifacts {
                println!("      {}", artifact.display());
            }
            println!("      {}", job.log_path.display());
        }
        println!();
    }
}

fn print_report(report: &RunReport) {
    println!("=== Backup run {} ===\n", report.timestamp);

    if let Some(reason) = report.abort_reason {
        println!("✗ Run aborted: {}", reason);
        return;
    }

    for outcome in &report.outcomes {
        let mark = if outcome.is_success() { "✓" } else { "✗" };
        println!("{} {}", mark, outcome.service);
        print_job("filesystem", &outcome.filesystem);
        if let Some(ref database) = outcome.database {
            print_job("database", database);
        }
    }

    println!();
    println!("Expired files removed: {}", report.files_removed);
    if report.sweep_errors > 0 {
        println!("Expired files not removed: {}", report.sweep_errors);
    }
    if let Some(ref failure) = report.sweep_failure {
        println!("✗ Sweep failed: {}", failure);
    }

    if report.overall_success {
        println!("\n✓ All backups completed successfully");
    } else {
        println!("\n✗ Backup run finished with failures");
    }
}

fn print_job(kind: &str, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Success { artifacts, .. } => {
            for artifact in artifacts {
                println!("    {}: {}", kind, artifact.display());
            }
        }
        JobOutcome::Failure { reason, log } => {
            println!("    {}: {} (see {})", kind, reason, log.display());
        }
    }
}
