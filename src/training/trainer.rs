//! Model trainer collaborator
//!
//! The classifier itself lives outside this crate. `ModelTrainer` is the seam; the
//! scheduler calls it on the blocking pool. `CommandTrainer` drives an external
//! trainer program:
//!
//! ```text
//! <program> <args...> --symbol BTCUSDT --days 730 --output-dir /tmp/xyz
//! ```
//!
//! The program writes `model.bin` and `scaler.bin` into the output directory and prints
//! the metadata fragment as JSON on the last non-empty stdout line. Exit code 3 means
//! "not enough history"; any other non-zero code is a trainer error.

use crate::models::{MetadataFragment, TrainedArtifact};
use std::path::PathBuf;
use std::process::Command;

/// Exit code the trainer uses to report insufficient history
pub const EXIT_INSUFFICIENT_DATA: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingFailure {
    /// Not enough usable history for this symbol
    InsufficientData(String),
    /// No trainer configured or the program could not be started
    Unavailable(String),
    /// The trainer ran and failed
    TrainerError(String),
    /// The trainer succeeded but its output could not be used
    InvalidOutput(String),
}

impl std::fmt::Display for TrainingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingFailure::InsufficientData(msg) => write!(f, "insufficient data: {}", msg),
            TrainingFailure::Unavailable(msg) => write!(f, "trainer unavailable: {}", msg),
            TrainingFailure::TrainerError(msg) => write!(f, "trainer error: {}", msg),
            TrainingFailure::InvalidOutput(msg) => write!(f, "invalid trainer output: {}", msg),
        }
    }
}

pub trait ModelTrainer: Send + Sync {
    /// Train `symbol` on `history_days` of history. Blocking.
    fn train(&self, symbol: &str, history_days: u32) -> Result<TrainedArtifact, TrainingFailure>;
}

#[derive(Debug, Clone)]
pub struct CommandTrainer {
    program: String,
    args: Vec<String>,
    work_dir: Option<PathBuf>,
}

impl CommandTrainer {
    pub fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
            work_dir: None,
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    fn parse_fragment(stdout: &str, symbol: &str, history_days: u32) -> Result<MetadataFragment, TrainingFailure> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| TrainingFailure::InvalidOutput("empty stdout".to_string()))?;

        let mut fragment: MetadataFragment = serde_json::from_str(line)
            .map_err(|e| TrainingFailure::InvalidOutput(format!("metadata json: {}", e)))?;

        if fragment.symbol != symbol {
            return Err(TrainingFailure::InvalidOutput(format!(
                "trainer reported symbol {} while training {}",
                fragment.symbol, symbol
            )));
        }
        if fragment.history_days == 0 {
            fragment.history_days = history_days;
        }
        Ok(fragment)
    }
}

impl ModelTrainer for CommandTrainer {
    fn train(&self, symbol: &str, history_days: u32) -> Result<TrainedArtifact, TrainingFailure> {
        if self.program.trim().is_empty() {
            return Err(TrainingFailure::Unavailable(
                "training.trainer_command is not configured".to_string(),
            ));
        }

        let output_dir = tempfile::tempdir()
            .map_err(|e| TrainingFailure::Unavailable(format!("temp dir: {}", e)))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--symbol")
            .arg(symbol)
            .arg("--days")
            .arg(history_days.to_string())
            .arg("--output-dir")
            .arg(output_dir.path());
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .map_err(|e| TrainingFailure::Unavailable(format!("{}: {}", self.program, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr_tail: String = stderr
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join(" | ");

        match output.status.code() {
            Some(0) => {}
            Some(EXIT_INSUFFICIENT_DATA) => {
                return Err(TrainingFailure::InsufficientData(stderr_tail));
            }
            Some(code) => {
                return Err(TrainingFailure::TrainerError(format!(
                    "exit code {}: {}",
                    code, stderr_tail
                )));
            }
            None => {
                return Err(TrainingFailure::TrainerError(
                    "terminated by signal".to_string(),
                ));
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let fragment = Self::parse_fragment(&stdout, symbol, history_days)?;

        let read = |name: &str| {
            std::fs::read(output_dir.path().join(name))
                .map_err(|e| TrainingFailure::InvalidOutput(format!("{}: {}", name, e)))
        };

        Ok(TrainedArtifact {
            model_bytes: read("model.bin")?,
            scaler_bytes: read("scaler.bin")?,
            fragment,
        })
    }
}
