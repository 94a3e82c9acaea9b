/// Error taxonomy for metabot
///
/// Every fallible operation in the library returns `BotResult<T>`. The loop inspects
/// `is_recoverable()` / `is_transient()` to decide whether to retry, degrade or skip;
/// nothing here is fatal to the decision loop on its own.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Transient I/O failure during {operation}: {message}")] TransientIo {
        operation: String,
        message: String,
    },

    #[error("Data integrity error for {subject}: {reason}")] DataIntegrity {
        subject: String,
        reason: String,
    },

    #[error("Concurrency conflict: lock {path} still held after {attempts} attempts")] ConcurrencyConflict {
        path: String,
        attempts: u32,
    },

    #[error("Model load failed for {path}: {reason}")] ModelLoad {
        path: String,
        reason: String,
    },

    #[error("Reconciliation mismatch for {symbol}: local {local}, exchange {exchange}")] ReconciliationMismatch {
        symbol: String,
        local: String,
        exchange: String,
    },

    #[error("Kill switch engaged: {reason}")] KillSwitchTriggered {
        reason: String,
    },

    #[error("Training failed for {symbol}: {failure}")] Training {
        symbol: String,
        failure: String,
    },

    #[error("Exchange rejected request: {0}")] ExchangeRejected(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")] Serialization(#[from] serde_json::Error),
}

impl BotError {
    /// Errors worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::TransientIo { .. } | BotError::ConcurrencyConflict { .. })
    }

    /// Errors the loop absorbs by degrading (skip a symbol, keep the last model)
    pub fn is_recoverable(&self) -> bool {
        match self {
            BotError::TransientIo { .. } => true,
            BotError::DataIntegrity { .. } => true,
            BotError::ConcurrencyConflict { .. } => true,
            BotError::ModelLoad { .. } => true,
            BotError::ReconciliationMismatch { .. } => true,
            BotError::Training { .. } => true,
            BotError::ExchangeRejected(_) => true,
            BotError::Io(_) => true,
            _ => false,
        }
    }

    /// Errors that count towards the kill switch error budget
    pub fn counts_against_error_budget(&self) -> bool {
        !matches!(
            self,
            BotError::DataIntegrity { .. } | BotError::KillSwitchTriggered { .. }
        )
    }

    pub fn transient(operation: &str, message: impl std::fmt::Display) -> Self {
        BotError::TransientIo {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn integrity(subject: &str, reason: impl std::fmt::Display) -> Self {
        BotError::DataIntegrity {
            subject: subject.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn model_load(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        BotError::ModelLoad {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(BotError::transient("get_positions", "timeout").is_transient());
        assert!(BotError::ConcurrencyConflict {
            path: "x.lock".to_string(),
            attempts: 3
        }
        .is_transient());
        assert!(!BotError::integrity("BTCUSDT", "bad size").is_transient());
        assert!(BotError::integrity("BTCUSDT", "bad size").is_recoverable());
        assert!(!BotError::Config("bad".to_string()).is_recoverable());
        assert!(!BotError::KillSwitchTriggered {
            reason: "drawdown".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_display_mentions_context() {
        let err = BotError::ConcurrencyConflict {
            path: "model_config_v1.0.json.lock".to_string(),
            attempts: 10,
        };
        let text = err.to_string();
        assert!(text.contains("model_config_v1.0.json.lock"));
        assert!(text.contains("10 attempts"));
    }
}
