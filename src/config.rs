use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

/// Captured stdout + stderr above this many bytes kills the run
pub const OUTPUT_LIMIT_BYTES: usize = 1 << 20;
/// Diagnostic text stored with a result row is clipped to this many characters
pub const DIAGNOSTIC_CLIP_CHARS: usize = 20_000;

#[derive(Parser)]
#[command(name = "sudoku-oj", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: String,

    /// Whether to flush the existing database
    #[arg(long = "flush-data", short = 'f', default_value_t = false)]
    pub flush_data: bool,

    /// Database file, defaults to the platform data directory
    #[arg(long = "database")]
    pub database: Option<PathBuf>,

    /// Compiler wall-clock limit in milliseconds
    #[arg(long, env = "COMPILE_TIMEOUT_MS", default_value_t = 20_000)]
    pub compile_timeout_ms: u64,

    /// Wall-clock budget for running all cases of one submission
    #[arg(long, env = "TOTAL_TIME_LIMIT_MS", default_value_t = 30_000)]
    pub total_time_limit_ms: u64,

    /// Extra time granted to the run timer on top of the total limit
    #[arg(long, env = "RUN_GRACE_MS", default_value_t = 1_000)]
    pub run_grace_ms: u64,
}

impl CliArgs {
    /// Load the configuration from the specified file
    pub fn to_config(&self) -> std::io::Result<Config> {
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| e.into())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            compile_timeout_ms: self.compile_timeout_ms,
            total_time_limit_ms: self.total_time_limit_ms,
            run_grace_ms: self.run_grace_ms,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    pub problems: Vec<ProblemConfig>,
}

#[derive(Deserialize, Debug)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct JudgeConfig {
    /// `%INPUT%` and `%OUTPUT%` are replaced with the source and binary paths
    pub compile_command: Vec<String>,
    /// GNU time compatible resource-accounting utility
    pub accounting_command: PathBuf,
    /// Parent of the per-submission temporary directories
    pub work_dir: Option<PathBuf>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            compile_command: ["g++", "-O2", "-std=c++17", "-o", "%OUTPUT%", "%INPUT%"]
                .into_iter()
                .map(String::from)
                .collect(),
            accounting_command: PathBuf::from("/usr/bin/time"),
            work_dir: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProblemConfig {
    pub id: i64,
    pub name: String,
    pub time_limit_ms: i64,
    pub memory_limit_kb: i64,
    pub cases: Vec<ProblemCaseConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProblemCaseConfig {
    pub input_file: String,
    pub answer_file: String,
    #[serde(default)]
    pub sample: bool,
}

/// Time knobs shared by the grading pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub compile_timeout_ms: u64,
    pub total_time_limit_ms: u64,
    pub run_grace_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            compile_timeout_ms: 20_000,
            total_time_limit_ms: 30_000,
            run_grace_ms: 1_000,
        }
    }
}
