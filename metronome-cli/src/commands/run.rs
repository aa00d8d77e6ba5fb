//! Run every job due in the current window.

use crate::console;
use crate::error::CliResult;
use colored::Colorize;
use metronome_cron::{CronError, Scheduler};
use std::process::ExitCode;

/// Run the current window.
///
/// In human mode each summary is printed as soon as its job concludes. Jobs
/// whose process could not be understood are reported on stderr and make the
/// command fail, but every summary that was collected is still printed.
pub async fn execute(scheduler: &Scheduler, json: bool) -> CliResult<ExitCode> {
    let mut run = scheduler.run_streamed();
    while let Some(summary) = run.next().await {
        if !json {
            println!("{}", console::render_summary_line(&summary));
        }
    }

    let (summaries, process_failures) = match run.finish().await {
        Ok(summary) => (summary.summaries, 0),
        Err(CronError::Run(failure)) => {
            for process_failure in &failure.failures {
                eprintln!("  {} {}", "Failed:".red().bold(), process_failure);
            }
            (failure.summary.summaries, failure.failures.len())
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", console::render_json(&summaries)?);
    } else if summaries.is_empty() && process_failures == 0 {
        println!("{}", "No jobs were due.".dimmed());
    }

    if process_failures > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(console::exit_code_for(&summaries))
    }
}
