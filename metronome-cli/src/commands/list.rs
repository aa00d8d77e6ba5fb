//! List registered jobs.

use crate::error::{CliError, CliResult};
use colored::Colorize;
use metronome_cron::Scheduler;

pub fn execute(scheduler: &Scheduler, json: bool) -> CliResult<()> {
    let stats = scheduler.job_stats();

    if json {
        let rendered =
            serde_json::to_string_pretty(&stats).map_err(|e| CliError::Output(e.to_string()))?;
        println!("{}", rendered);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No jobs registered.");
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<16} {:<24} {:<16} {:<8} {}",
            "ID", "NAME", "EXPRESSION", "REPEAT", "NEXT RUN"
        )
        .bold()
    );
    for job in &stats {
        let repeat = job
            .repeat_after_seconds
            .map(|seconds| format!("{}s", seconds))
            .unwrap_or_else(|| "-".to_string());
        let next_run = job
            .next_run
            .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<16} {:<24} {:<16} {:<8} {}",
            job.id.to_string(),
            job.name,
            job.expression,
            repeat,
            next_run.dimmed()
        );
    }

    println!();
    println!("Total jobs: {}", stats.len());
    Ok(())
}
