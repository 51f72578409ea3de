//! Alerting boundary for operator-visible fetch failures.
//!
//! Gateway timeouts are reported here so an operator channel can pick
//! them up. The default sink just logs; deployments wire their own.

/// Sink for operator alerts.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver a one-line alert message.
    async fn notify(&self, message: &str);
}

/// AlertSink that writes to the tracing error stream.
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink;

#[async_trait::async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, message: &str) {
        tracing::error!("{message}");
    }
}
