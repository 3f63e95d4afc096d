//! Operator alerting.
//!
//! Every action outcome and every abnormal cycle produces an [`Alert`].
//! Delivery failures never affect reconciliation: [`notify`] logs and
//! drops them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{HttpMethod, HttpRequest, HttpTransport};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    /// Channel the alert concerns.
    pub channel: String,
    /// Affected SKU; `None` for cycle-level alerts of a full run.
    pub sku: Option<String>,
    /// Action kind (`insert`, `update`, ...) or `cycle`.
    pub action: String,
    /// Human-readable detail, including every affected SKU for guard aborts.
    pub message: String,
    /// When the alert was raised.
    pub at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        severity: Severity,
        channel: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            channel: channel.into(),
            sku: None,
            action: action.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn for_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert delivery failed: {message}")]
    Delivery { message: String },
}

/// Destination for operator alerts.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// Send an alert, logging instead of propagating delivery failures.
pub async fn notify(alerter: &dyn Alerter, alert: Alert) {
    if let Err(e) = alerter.send(&alert).await {
        tracing::warn!(
            channel = %alert.channel,
            sku = alert.sku.as_deref().unwrap_or("-"),
            error = %e,
            "Dropping undeliverable alert"
        );
    }
}

/// Writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlerter;

#[async_trait]
impl Alerter for TracingAlerter {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let sku = alert.sku.as_deref().unwrap_or("-");
        match alert.severity {
            Severity::Info => tracing::info!(
                channel = %alert.channel, sku, action = %alert.action, "{}", alert.message
            ),
            Severity::Warning => tracing::warn!(
                channel = %alert.channel, sku, action = %alert.action, "{}", alert.message
            ),
            Severity::Error | Severity::Critical => tracing::error!(
                channel = %alert.channel,
                sku,
                action = %alert.action,
                severity = %alert.severity,
                "{}",
                alert.message
            ),
        }
        Ok(())
    }
}

/// Posts alerts as JSON to a webhook.
///
/// Alerts below `min_severity` are dropped before any request is made.
pub struct WebhookAlerter {
    url: String,
    transport: Arc<dyn HttpTransport>,
    min_severity: Severity,
}

impl WebhookAlerter {
    pub fn new(url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            url: url.into(),
            transport,
            min_severity: Severity::Warning,
        }
    }

    #[must_use]
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }
}

#[async_trait]
impl Alerter for WebhookAlerter {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        if alert.severity < self.min_severity {
            return Ok(());
        }

        let request = HttpRequest::new(HttpMethod::Post, self.url.as_str())
            .json(alert)
            .map_err(|e| AlertError::Delivery {
                message: e.to_string(),
            })?;
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AlertError::Delivery {
                message: e.to_string(),
            })?;

        if response.is_success() {
            Ok(())
        } else {
            Err(AlertError::Delivery {
                message: format!("webhook returned HTTP {}", response.status),
            })
        }
    }
}

/// Fans one alert out to several destinations.
///
/// Every destination is attempted; the first failure is reported.
pub struct FanoutAlerter {
    targets: Vec<Arc<dyn Alerter>>,
}

impl FanoutAlerter {
    pub fn new(targets: Vec<Arc<dyn Alerter>>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl Alerter for FanoutAlerter {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let mut first_error = None;
        for target in &self.targets {
            if let Err(e) = target.send(alert).await
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
