//! Notifier trait for sending alerts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::item::{ItemId, MonitoredItem, NotificationRule};
use crate::outcome::RequestResult;

/// A notification to be sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Item the notification is about
    pub item_id: ItemId,
}

impl Notification {
    /// Build the payload for a rule that fired on a check result
    pub fn for_result(
        item: &MonitoredItem,
        rule: NotificationRule,
        result: &RequestResult,
    ) -> Self {
        let body = match rule {
            NotificationRule::Error => match (result.status_code, &result.error) {
                (Some(code), _) => format!("Check failed with HTTP {}", code),
                (None, Some(error)) => format!("Check failed: {}", error),
                (None, None) => "Check failed".to_string(),
            },
            NotificationRule::Change => {
                let lines = result
                    .diff
                    .as_ref()
                    .map(|d| d.total_changed_lines)
                    .unwrap_or(0);
                format!("Content changed, {} line(s) differ", lines)
            }
            NotificationRule::Success => match result.status_code {
                Some(code) => format!("Check succeeded with HTTP {}", code),
                None => "Check succeeded".to_string(),
            },
            NotificationRule::HttpCode { code } => format!("Response returned HTTP {}", code),
        };
        Self {
            title: item.display_title().to_string(),
            body,
            item_id: item.id,
        }
    }
}

/// Trait for sending notifications
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "pushover")
    fn type_name(&self) -> &str;

    /// Send a notification
    async fn notify(&self, notification: &Notification) -> crate::Result<()>;
}
