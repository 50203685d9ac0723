//! Slack notifications
//!
//! Two transports: an incoming webhook, or a bot token posting through
//! `chat.postMessage`. `ChatNotifier` never fails: when the transport does,
//! the report goes to the console instead.

use super::{ConsoleNotifier, Notifier};
use crate::config::ConfigError;
use crate::error::{notify_error, DriftResult};
use crate::snapshot::DriftReport;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const SLACK_API_BASE: &str = "https://slack.com/api/";

/// Posts one rendered report to a chat service
pub trait ChatTransport: Send + Sync {
    fn post(&self, report: &DriftReport) -> DriftResult<()>;

    /// Destination for logs, without secrets
    fn destination(&self) -> String;
}

/// Slack message body shared by both transports
pub fn slack_payload(report: &DriftReport) -> Value {
    fn field(title: &str, value: String, short: bool) -> Value {
        json!({ "title": title, "value": value, "short": short })
    }

    fn names<'a>(items: impl Iterator<Item = &'a String>) -> String {
        let joined = items.map(|s| format!("`{}`", s)).collect::<Vec<_>>().join(", ");
        if joined.is_empty() {
            "-".to_string()
        } else {
            joined
        }
    }

    let type_changes = if report.type_changes().is_empty() {
        "-".to_string()
    } else {
        report
            .type_changes()
            .iter()
            .map(|(column, change)| format!("`{}`: {} → {}", column, change.old, change.new))
            .collect::<Vec<_>>()
            .join("\n")
    };

    json!({
        "text": format!(":warning: DataFrame schema changed at `{}`", report.checkpoint_id()),
        "attachments": [{
            "color": "warning",
            "fallback": report.message(),
            "fields": [
                field("Added columns", names(report.added_columns().iter()), true),
                field("Removed columns", names(report.removed_columns().iter()), true),
                field("Type changes", type_changes, false),
                field(
                    "Rows",
                    format!("{} → {}", report.old_row_count(), report.new_row_count()),
                    true,
                ),
            ],
            "footer": "dfdrift",
            "ts": chrono::Utc::now().timestamp(),
        }],
        "metadata": {
            "event_type": "dfdrift_schema_drift",
            "event_payload": report.summary(),
        },
    })
}

fn http_client(timeout: Duration) -> DriftResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::InvalidValue(format!("building HTTP client: {}", e)).into())
}

/// Slack incoming webhook
pub struct SlackWebhook {
    http: Client,
    url: Url,
}

impl SlackWebhook {
    pub fn new(url: Url, timeout: Duration) -> DriftResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            url,
        })
    }
}

impl ChatTransport for SlackWebhook {
    fn post(&self, report: &DriftReport) -> DriftResult<()> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&slack_payload(report))
            .send()
            .map_err(|e| notify_error(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(notify_error(format!("webhook returned {}: {}", status, detail)));
        }

        Ok(())
    }

    fn destination(&self) -> String {
        // Webhook paths are credentials; only the host is logged
        format!("webhook {}", self.url.host_str().unwrap_or("unknown"))
    }
}

/// Response envelope of the Slack Web API
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack bot token posting to one channel
pub struct SlackBot {
    http: Client,
    token: String,
    channel: String,
    api_base: Url,
}

impl SlackBot {
    pub fn new(token: String, channel: String, timeout: Duration) -> DriftResult<Self> {
        let api_base = Url::parse(SLACK_API_BASE)
            .map_err(|e| ConfigError::InvalidValue(format!("slack api base: {}", e)))?;
        Self::with_api_base(token, channel, api_base, timeout)
    }

    /// Point the bot at another Web API base URL (must end in `/`)
    pub fn with_api_base(token: String, channel: String, api_base: Url, timeout: Duration) -> DriftResult<Self> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingVar("slack bot token".to_string()).into());
        }
        if channel.trim().is_empty() {
            return Err(ConfigError::MissingVar("slack channel".to_string()).into());
        }

        Ok(Self {
            http: http_client(timeout)?,
            token,
            channel,
            api_base,
        })
    }
}

impl ChatTransport for SlackBot {
    fn post(&self, report: &DriftReport) -> DriftResult<()> {
        let url = self
            .api_base
            .join("chat.postMessage")
            .map_err(|e| notify_error(format!("building chat.postMessage url: {}", e)))?;

        let mut payload = slack_payload(report);
        payload["channel"] = Value::String(self.channel.clone());

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .map_err(|e| notify_error(format!("chat.postMessage request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(notify_error(format!("chat.postMessage returned {}", status)));
        }

        let body: ApiResponse = response
            .json()
            .map_err(|e| notify_error(format!("unreadable chat.postMessage response: {}", e)))?;
        if !body.ok {
            return Err(notify_error(format!(
                "chat.postMessage rejected: {}",
                body.error.unwrap_or_else(|| "unknown_error".to_string())
            )));
        }

        Ok(())
    }

    fn destination(&self) -> String {
        format!("channel {}", self.channel)
    }
}

/// Chat notifier with a console fallback
pub struct ChatNotifier {
    transport: Box<dyn ChatTransport>,
    fallback: ConsoleNotifier,
}

impl ChatNotifier {
    pub fn new(transport: impl ChatTransport + 'static) -> Self {
        Self::with_fallback(transport, ConsoleNotifier::stderr())
    }

    pub fn with_fallback(transport: impl ChatTransport + 'static, fallback: ConsoleNotifier) -> Self {
        Self {
            transport: Box::new(transport),
            fallback,
        }
    }
}

impl Notifier for ChatNotifier {
    fn notify(&self, report: &DriftReport) -> DriftResult<()> {
        match self.transport.post(report) {
            Ok(()) => {
                info!(
                    "Sent drift report for {} to Slack {}",
                    report.checkpoint_id(),
                    self.transport.destination()
                );
            }
            Err(e) => {
                warn!(
                    code = e.code(),
                    "Slack delivery to {} failed, falling back to console: {}",
                    self.transport.destination(),
                    e
                );
                self.fallback.notify(report)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointId;
    use crate::notify::testing::SharedBuffer;
    use crate::snapshot::{ColumnDescriptor, DiffEngine, SchemaSnapshot};
    use std::sync::{Arc, Mutex};

    fn report() -> DriftReport {
        let old = SchemaSnapshot::new(
            vec![
                ColumnDescriptor::new("user_id", "int64", 0),
                ColumnDescriptor::new("age", "int64", 0),
            ],
            3,
        )
        .unwrap();
        let new = SchemaSnapshot::new(
            vec![
                ColumnDescriptor::new("user_id", "string", 0),
                ColumnDescriptor::new("age2", "int64", 0),
            ],
            3,
        )
        .unwrap();
        DiffEngine::diff(&CheckpointId::new("features.rs:88"), &old, &new).unwrap()
    }

    struct FailingTransport;

    impl ChatTransport for FailingTransport {
        fn post(&self, _report: &DriftReport) -> DriftResult<()> {
            Err(notify_error("429 rate limited"))
        }

        fn destination(&self) -> String {
            "nowhere".to_string()
        }
    }

    #[derive(Clone, Default)]
    struct CapturingTransport(Arc<Mutex<Vec<Value>>>);

    impl ChatTransport for CapturingTransport {
        fn post(&self, report: &DriftReport) -> DriftResult<()> {
            self.0.lock().unwrap().push(slack_payload(report));
            Ok(())
        }

        fn destination(&self) -> String {
            "capture".to_string()
        }
    }

    #[test]
    fn test_payload_lists_every_change() {
        let payload = slack_payload(&report());
        let fields = &payload["attachments"][0]["fields"];

        assert_eq!(payload["text"], ":warning: DataFrame schema changed at `features.rs:88`");
        assert_eq!(fields[0]["value"], "`age2`");
        assert_eq!(fields[1]["value"], "`age`");
        assert_eq!(fields[2]["value"], "`user_id`: int64 → string");
        assert_eq!(
            payload["metadata"]["event_payload"]["type_changes"]["user_id"]["new"],
            "string"
        );
    }

    #[test]
    fn test_failed_delivery_falls_back_to_console() {
        let buffer = SharedBuffer::default();
        let notifier =
            ChatNotifier::with_fallback(FailingTransport, ConsoleNotifier::with_writer(buffer.clone()));

        assert!(notifier.notify(&report()).is_ok());
        assert!(buffer.contents().contains("DataFrame schema changed at features.rs:88"));
    }

    #[test]
    fn test_successful_delivery_skips_console() {
        let buffer = SharedBuffer::default();
        let transport = CapturingTransport::default();
        let notifier =
            ChatNotifier::with_fallback(transport.clone(), ConsoleNotifier::with_writer(buffer.clone()));

        notifier.notify(&report()).unwrap();

        assert_eq!(transport.0.lock().unwrap().len(), 1);
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_unreachable_webhook_is_a_notify_error() {
        let url = Url::parse("http://127.0.0.1:9/services/T/B/X").unwrap();
        let webhook = SlackWebhook::new(url, Duration::from_millis(500)).unwrap();

        let result = webhook.post(&report());
        assert!(matches!(result, Err(crate::error::DriftError::Notify(_))));
        assert_eq!(webhook.destination(), "webhook 127.0.0.1");
    }

    #[test]
    fn test_bot_requires_token_and_channel() {
        assert!(SlackBot::new(String::new(), "#alerts".into(), Duration::from_secs(1)).is_err());
        assert!(SlackBot::new("xoxb-1".into(), " ".into(), Duration::from_secs(1)).is_err());

        let bot = SlackBot::new("xoxb-1".into(), "#alerts".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(bot.destination(), "channel #alerts");
    }
}
