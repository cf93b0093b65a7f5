//! Response handling - renders alerts on stdout

use crate::config::LogFormat;
use crate::detection::AlertEvent;
use crate::metrics::ALERTS_TOTAL;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct ResponseHandler {
    log_format: LogFormat,
}

impl ResponseHandler {
    pub fn new(log_format: LogFormat) -> Self {
        Self { log_format }
    }

    /// Print alerts until every sender is dropped.
    pub async fn run(&self, mut rx: mpsc::Receiver<AlertEvent>) {
        info!("Response handler started");
        while let Some(alert) = rx.recv().await {
            self.handle_alert(&alert);
        }
        debug!("Alert channel closed, response handler stopping");
    }

    fn handle_alert(&self, alert: &AlertEvent) {
        ALERTS_TOTAL.inc();
        println!("{}", self.render(alert));
    }

    /// Render an alert as a single output line.
    pub fn render(&self, alert: &AlertEvent) -> String {
        match self.log_format {
            LogFormat::Json => {
                serde_json::to_string(alert).unwrap_or_else(|_| alert.to_string())
            }
            LogFormat::Text => alert.to_string(),
        }
    }
}

impl Default for ResponseHandler {
    fn default() -> Self {
        Self::new(LogFormat::Text)
    }
}
