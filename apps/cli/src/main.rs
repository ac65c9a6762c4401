mod args;
mod config;
mod dirs;

use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;
use sync_app::{
    AppError, AppState, LogGuard, StatusReport, SyncOptions, SyncReport, init_console_logging,
    init_logging, next_run_delay,
};
use sync_state::RunStatus;
use tracing::{error, info};

use crate::args::{Cli, Command};
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_or_create(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    let data_dir = match dirs::resolve_data_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    let app_config = config.config.to_app_config(data_dir);
    if let Err(err) = app_config.validate() {
        eprintln!("{}: {}", config.file.display(), err);
        return ExitCode::from(2);
    }
    let app = AppState::new(app_config);
    if let Err(err) = app.ensure_data_dir() {
        eprintln!("failed to create data dir {}: {}", app.config.data_dir.display(), err);
        return ExitCode::from(1);
    }

    let _guard = setup_logging(&app, cli.verbose);
    if config.created {
        info!("created config at {}", config.file.display());
    }

    let result = match cli.command {
        Command::Sync { dry_run } => run_sync(&app, dry_run).await,
        Command::Watch => run_watch(&app, &config.config).await,
        Command::Status { json } => show_status(&app, json),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::from(1)
        }
    }
}

/// File logging when possible, stderr only otherwise.
fn setup_logging(app: &AppState, verbose: bool) -> LogGuard {
    match init_logging(&app.config.log_dir(), verbose) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("file logging unavailable: {}", err);
            init_console_logging(verbose)
        }
    }
}

fn print_sync_report(report: &SyncReport) {
    let counts = &report.counts;
    println!(
        "{}: files={} skipped={} records={} emitted={} warnings={}",
        report.status,
        counts.files_scanned,
        counts.files_skipped,
        counts.records_parsed,
        counts.records_emitted,
        counts.warnings
    );
    if let Some(reason) = &report.skip_reason {
        println!("upload skipped: {reason}");
    }
    if let Some(err) = &report.error {
        println!("upload error: {err}");
    }
    if report.status == RunStatus::Success {
        println!(
            "uploaded {} totals, flushed {} queued payloads",
            counts.totals_uploaded, counts.queue_flushed
        );
    }
    if report.queued_payloads > 0 {
        println!("{} payloads waiting in queue", report.queued_payloads);
    }
}

async fn run_sync(app: &AppState, dry_run: bool) -> Result<ExitCode, AppError> {
    let report = app.services.sync.run(SyncOptions { dry_run }).await?;
    print_sync_report(&report);
    if report.dry_run {
        println!("{}", serde_json::to_string_pretty(&report.payload)?);
    }
    if report.status == RunStatus::Error {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

/// One watch-mode pass. A failed run is logged and the schedule continues.
async fn run_watch_once(app: &AppState) -> Option<SyncReport> {
    match app.services.sync.run(SyncOptions::default()).await {
        Ok(report) => {
            print_sync_report(&report);
            Some(report)
        }
        Err(err) => {
            error!("sync run failed: {}; retrying at the next interval", err);
            None
        }
    }
}

async fn run_watch(app: &AppState, config: &CliConfig) -> Result<ExitCode, AppError> {
    info!(
        "watching {} every {}s",
        app.config.base_path.display(),
        config.watch_interval_secs
    );
    loop {
        run_watch_once(app).await;

        let delay = next_run_delay(config.watch_interval(), config.watch_jitter());
        info!("next run in {}s", delay.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping watch");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| "never".to_string())
}

fn print_status(report: &StatusReport) {
    println!(
        "last run:        {} ({})",
        format_time(report.last_run_at),
        report.last_status
    );
    println!("last success:    {}", format_time(report.last_success_at));
    if let Some(err) = &report.last_error {
        println!("last error:      {err}");
    }
    if let Some(reason) = &report.last_skip_reason {
        println!("last skip:       {reason}");
    }
    println!("tracked files:   {}", report.tracked_files);
    println!("ledger entries:  {}", report.ledger_entries);
    println!("queued payloads: {}", report.queued_payloads);
    if report.days.is_empty() {
        return;
    }
    println!("recent days:");
    for day in &report.days {
        println!(
            "  {}  {:>12} tokens  {}",
            day.day,
            day.total,
            day.models.join(", ")
        );
    }
}

fn show_status(app: &AppState, json: bool) -> Result<ExitCode, AppError> {
    let report = app.services.status.report()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_status(&report);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use sync_app::AppConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn failed_watch_run_does_not_stop_the_schedule() {
        let dir = tempdir().expect("temp dir");
        let data_dir = dir.path().join("data");
        let logs_dir = dir.path().join("logs");
        fs::create_dir_all(&data_dir).expect("data dir");
        fs::create_dir_all(&logs_dir).expect("logs dir");
        fs::write(data_dir.join("state.json"), "{oops").expect("write");

        let app = AppState::new(AppConfig::new(data_dir.clone(), logs_dir));
        assert!(run_watch_once(&app).await.is_none());

        fs::remove_file(data_dir.join("state.json")).expect("remove");
        let report = run_watch_once(&app).await.expect("next run succeeds");
        assert_eq!(report.status, RunStatus::Skipped);
    }
}
