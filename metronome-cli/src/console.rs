//! Rendering of run results.

use crate::error::CliResult;
use colored::Colorize;
use metronome_cron::{JobResultState, JobSummary, protocol};
use std::process::ExitCode;

/// One human-readable line per execution.
pub fn render_summary_line(summary: &JobSummary) -> String {
    let info = &summary.info;
    let state = match summary.result.state {
        JobResultState::Done => "done".green().bold(),
        JobResultState::Fail => "fail".red().bold(),
        other => other.as_str().yellow().bold(),
    };
    let repeat = info
        .repeat_after_seconds
        .map(|seconds| format!(" / {}s", seconds))
        .unwrap_or_default();

    format!(
        "{}  {}  {}  {}  {}",
        info.start.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        info.name,
        format!("[{}{}]", info.expression, repeat).cyan(),
        state,
        format!("({:.3}s)", summary.duration().num_milliseconds() as f64 / 1000.0).dimmed(),
    )
}

/// Indented JSON array of summaries.
pub fn render_json(summaries: &[JobSummary]) -> CliResult<String> {
    Ok(protocol::encode_summaries_pretty(summaries)?)
}

/// Whether any execution ended in a failed state.
pub fn has_failures(summaries: &[JobSummary]) -> bool {
    summaries.iter().any(JobSummary::is_failed)
}

/// Exit status for a set of summaries. Nothing ran counts as success.
pub fn exit_code_for(summaries: &[JobSummary]) -> ExitCode {
    if has_failures(summaries) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
