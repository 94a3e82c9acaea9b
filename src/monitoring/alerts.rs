//! Operator alerts
//!
//! Every alert is logged. When enabled, alerts of the configured kinds (and every
//! CRITICAL one) are also posted to a JSON webhook with a Discord-compatible embed.
//! Delivery runs on its own task so a slow endpoint never stalls the loop.

use crate::config::AlertsConfig;
use crate::logger::{self, LogTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    GuardPaused,
    KillSwitch,
    ModelRotation,
    HealthIssue,
    BotStarted,
    BotStopped,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AlertKind::GuardPaused => "PERFORMANCE_GUARD_PAUSED",
            AlertKind::KillSwitch => "KILL_SWITCH",
            AlertKind::ModelRotation => "MODEL_ROTATION",
            AlertKind::HealthIssue => "HEALTH_ISSUE",
            AlertKind::BotStarted => "BOT_STARTED",
            AlertKind::BotStopped => "BOT_STOPPED",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    fn emoji(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "🔵",
            AlertSeverity::Warning => "🟡",
            AlertSeverity::Critical => "🔴",
        }
    }

    fn embed_color(&self) -> u32 {
        match self {
            AlertSeverity::Info => 3_447_003,
            AlertSeverity::Warning => 16_776_960,
            AlertSeverity::Critical => 15_158_332,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            context: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }
}

/// Discord-style webhook body
pub fn webhook_payload(alert: &Alert) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = alert
        .context
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value, "inline": true }))
        .collect();

    json!({
        "embeds": [{
            "title": format!("{} {}", alert.severity.emoji(), alert.kind),
            "description": alert.message,
            "color": alert.severity.embed_color(),
            "timestamp": alert.timestamp.to_rfc3339(),
            "fields": fields,
        }]
    })
}

pub struct AlertManager {
    cfg: AlertsConfig,
    client: Option<reqwest::Client>,
}

impl AlertManager {
    pub fn new(cfg: AlertsConfig) -> Self {
        let client = if cfg.enabled && !cfg.webhook_url.trim().is_empty() {
            match reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
                .build()
            {
                Ok(client) => Some(client),
                Err(e) => {
                    logger::warning(
                        LogTag::Monitor,
                        &format!("Alert webhook disabled, HTTP client failed to build: {}", e),
                    );
                    None
                }
            }
        } else {
            None
        };

        logger::debug(
            LogTag::Monitor,
            &format!(
                "Alert manager ready (enabled={}, webhook={})",
                cfg.enabled,
                client.is_some()
            ),
        );
        Self { cfg, client }
    }

    /// Whether this alert goes past the log
    pub fn should_deliver(&self, alert: &Alert) -> bool {
        if !self.cfg.enabled {
            return false;
        }
        if alert.severity == AlertSeverity::Critical {
            return true;
        }
        match alert.kind {
            AlertKind::GuardPaused => self.cfg.alert_on_pause,
            AlertKind::KillSwitch => self.cfg.alert_on_kill_switch,
            AlertKind::ModelRotation => self.cfg.alert_on_model_rotation,
            AlertKind::HealthIssue => self.cfg.alert_on_health_issues,
            AlertKind::BotStarted | AlertKind::BotStopped => true,
        }
    }

    pub fn notify(&self, alert: Alert) {
        let line = format!("[ALERT] {}: {}", alert.kind, alert.message);
        match alert.severity {
            AlertSeverity::Critical => logger::error(LogTag::Monitor, &format!("🚨 {}", line)),
            AlertSeverity::Warning => logger::warning(LogTag::Monitor, &line),
            AlertSeverity::Info => logger::info(LogTag::Monitor, &line),
        }

        if !self.should_deliver(&alert) {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };
        let url = self.cfg.webhook_url.clone();
        let payload = webhook_payload(&alert);

        tokio::spawn(async move {
            let result = client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .and_then(|resp| resp.error_for_status());
            if let Err(e) = result {
                logger::error(
                    LogTag::Monitor,
                    &format!("Failed to deliver {} alert: {}", alert.kind, e),
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> AlertsConfig {
        AlertsConfig {
            enabled: true,
            alert_on_model_rotation: false,
            ..AlertsConfig::default()
        }
    }

    #[test]
    fn test_delivery_rules() {
        let manager = AlertManager::new(enabled());
        let rotation = Alert::new(AlertKind::ModelRotation, AlertSeverity::Info, "r1 -> r2");
        let paused = Alert::new(AlertKind::GuardPaused, AlertSeverity::Warning, "paused");
        let critical = Alert::new(AlertKind::ModelRotation, AlertSeverity::Critical, "bad");

        assert!(!manager.should_deliver(&rotation));
        assert!(manager.should_deliver(&paused));
        assert!(manager.should_deliver(&critical));

        let disabled = AlertManager::new(AlertsConfig::default());
        assert!(!disabled.should_deliver(&critical));
    }

    #[test]
    fn test_payload_shape() {
        let alert = Alert::new(AlertKind::KillSwitch, AlertSeverity::Critical, "drawdown 16%")
            .with("equity", 8_400.0);
        let payload = webhook_payload(&alert);
        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "🔴 KILL_SWITCH");
        assert_eq!(embed["description"], "drawdown 16%");
        assert_eq!(embed["fields"][0]["name"], "equity");
        assert_eq!(embed["fields"][0]["value"], "8400");
    }

    #[test]
    fn test_notify_without_webhook_only_logs() {
        // no runtime needed: nothing is spawned without a client
        let manager = AlertManager::new(enabled());
        manager.notify(Alert::new(AlertKind::GuardPaused, AlertSeverity::Warning, "paused"));
    }
}
