//! Operational surfaces: health checks, status file, alerts and the trade log

pub mod alerts;
pub mod health;
pub mod status;
pub mod trade_log;

pub use alerts::{Alert, AlertKind, AlertManager, AlertSeverity};
pub use health::{HealthContext, HealthMonitor, HealthReport, HealthStatus};
pub use status::{read_status_file, write_status_file, ModelView, StatusSnapshot};
pub use trade_log::{PnlSummary, TradeAction, TradeLog, TradeRecord};
