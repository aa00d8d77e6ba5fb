//! Run a single job.
//!
//! This is also the entry point child processes are started with; with
//! `--json` it prints exactly one payload (or `null`) on stdout.

use crate::console;
use crate::error::{CliError, CliResult};
use metronome_cron::{JobId, RunParameters, Scheduler, protocol};
use std::process::ExitCode;

/// Arguments of `run-job`.
#[derive(Debug)]
pub struct RunJobArgs {
    pub id: String,
    pub no_force: bool,
    pub json: bool,
    pub parameters: Option<String>,
}

pub async fn execute(scheduler: &Scheduler, args: RunJobArgs) -> CliResult<ExitCode> {
    let id = JobId::parse(&args.id);
    let parameters = match args.parameters.as_deref() {
        Some(raw) => protocol::decode_parameters(raw)
            .map_err(|e| CliError::InvalidArgument(format!("--parameters: {}", e)))?,
        None => RunParameters::new(0),
    };

    let Some(summary) = scheduler.run_job_with(&id, !args.no_force, parameters).await? else {
        if args.json {
            println!("null");
        } else {
            println!("Command was not executed because it is not its due time");
        }
        return Ok(ExitCode::SUCCESS);
    };

    if args.json {
        println!("{}", protocol::encode_summary(&summary)?);
    } else {
        println!("{}", console::render_summary_line(&summary));
    }

    Ok(console::exit_code_for(std::slice::from_ref(&summary)))
}
