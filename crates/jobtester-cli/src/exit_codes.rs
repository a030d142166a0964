//! Process exit codes. Part of the CLI's contract with schedulers running it.
//!
//! Fatal library errors carry their own code (`TesterError::exit_code`):
//! 2 configuration, 3 discovery, 4 callback server.

pub const SUCCESS: i32 = 0;
pub const JOB_FAILED: i32 = 1; // At least one job failed (only with --fail-on-job-failure)
pub const CONFIG_ERROR: i32 = 2;

/// Exit code for a fatal error. Errors not raised by the library count as configuration errors.
pub fn from_error(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<jobtester_core::TesterError>()
        .map_or(CONFIG_ERROR, jobtester_core::TesterError::exit_code)
}
