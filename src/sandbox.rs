mod accounting_runner;
mod compile;
mod harness;
mod report;
mod runner;
mod simple_runner;

pub use accounting_runner::{AccountingRunner, parse_accounting};
pub use compile::compile;
pub use harness::generate_harness;
pub use report::{CaseReport, parse_case_reports};
pub use runner::{OVERFLOW_EXIT_CODE, SandboxRunner, run_capped};
pub use simple_runner::SimpleRunner;

use std::path::Path;
use std::sync::Arc;

/// Result of compilation process
#[derive(Debug)]
pub struct CompilationResult {
    pub success: bool,
    /// Compiler output; logged, never shown to the submitter
    pub diagnostics: String,
    pub elapsed_ms: u64,
}

/// Result of one bounded execution of a compiled binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub timeout: bool,
    pub output_overflow: bool,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// User CPU time reported by the accounting utility
    pub exec_time_ms: Option<u64>,
    /// Peak resident set size reported by the accounting utility
    pub memory_kb: Option<u64>,
    pub wall_time_ms: u64,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timeout && !self.output_overflow && self.exit_code == Some(0)
    }
}

/// Creates a sandbox runner based on the accounting utility's availability
///
/// If the GNU-time compatible utility exists, the binary is wrapped with it
/// and CPU time / peak memory are reported. Otherwise a SimpleRunner is
/// used, which only enforces the timeout and the output cap.
pub fn create_sandbox_runner(accounting_command: &Path) -> Arc<dyn SandboxRunner> {
    if accounting_command.exists() {
        log::info!(
            "Creating AccountingRunner using {}",
            accounting_command.display()
        );
        Arc::new(AccountingRunner::new(accounting_command.to_path_buf()))
    } else {
        log::warn!(
            "{} not found, creating SimpleRunner without CPU time or memory accounting",
            accounting_command.display()
        );
        Arc::new(SimpleRunner)
    }
}
