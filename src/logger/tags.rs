/// Log tags identify the subsystem a message comes from
///
/// Each tag maps to a `--debug-<key>` flag that gates its DEBUG output.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Models,
    Training,
    Symbols,
    Guard,
    Positions,
    Exchange,
    Risk,
    Orchestrator,
    Monitor,
    Other(String),
}

impl LogTag {
    /// Key used for `--debug-<key>` / `--verbose-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Models => "models".to_string(),
            LogTag::Training => "training".to_string(),
            LogTag::Symbols => "symbols".to_string(),
            LogTag::Guard => "guard".to_string(),
            LogTag::Positions => "positions".to_string(),
            LogTag::Exchange => "exchange".to_string(),
            LogTag::Risk => "risk".to_string(),
            LogTag::Orchestrator => "orchestrator".to_string(),
            LogTag::Monitor => "monitor".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Uppercase label written to the log file
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Orchestrator => "ORCH".to_string(),
            other => other.to_debug_key().to_uppercase(),
        }
    }

    /// All built-in tags, used when scanning command-line flags
    pub fn all() -> Vec<LogTag> {
        vec![
            LogTag::System,
            LogTag::Config,
            LogTag::Models,
            LogTag::Training,
            LogTag::Symbols,
            LogTag::Guard,
            LogTag::Positions,
            LogTag::Exchange,
            LogTag::Risk,
            LogTag::Orchestrator,
            LogTag::Monitor,
        ]
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
