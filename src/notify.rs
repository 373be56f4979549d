//! Outbound notifications for form submissions and account events.
//!
//! Delivery to a messaging gateway is someone else's job; the service only
//! formats the text and hands it to a [`Notifier`].

use serde_json::{Map, Value};
use std::sync::Mutex;

pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &str, text: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, text: &str) {
        tracing::info!(subject, text, "notification");
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, subject: &str, text: &str) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((subject.to_string(), text.to_string()));
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Plain-text message for a form submission: a title line, then one
/// `key: value` line per non-empty field in submission order.
pub fn format_submission(title: &str, fields: &Map<String, Value>) -> String {
    let mut lines = vec![title.to_string()];
    for (key, value) in fields {
        let shown = display_value(value);
        if !shown.is_empty() {
            lines.push(format!("{}: {}", key, shown));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_submission_skips_empty_fields() {
        let fields = match json!({
            "name": "Ada",
            "email": "ada@example.com",
            "phone": "",
            "skills": ["rust", "sql"],
            "years": 7
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };

        let text = format_submission("New contact request", &fields);

        assert_eq!(
            text,
            "New contact request\nname: Ada\nemail: ada@example.com\nskills: rust, sql\nyears: 7"
        );
    }

    #[test]
    fn test_memory_notifier_records() {
        let notifier = MemoryNotifier::default();
        notifier.notify("subject", "body");
        assert_eq!(notifier.sent(), vec![("subject".to_string(), "body".to_string())]);
    }
}
