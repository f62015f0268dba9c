//! Monitored item model and admission validation

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VigilError};
use crate::history::History;

/// Stable identifier for a monitored item, preserved across edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A notification rule attached to a monitored item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationRule {
    Error,
    Change,
    Success,
    HttpCode { code: u16 },
}

/// A single HTTP(S) resource under observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredItem {
    pub id: ItemId,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Poll interval in seconds, at least 1
    pub interval: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub notifications: Vec<NotificationRule>,
    #[serde(default)]
    pub history: History,
}

fn default_enabled() -> bool {
    true
}

impl MonitoredItem {
    /// Create a new item, validating the url and interval first
    pub fn new(
        url: String,
        title: Option<String>,
        interval: u64,
        enabled: bool,
        notifications: Vec<NotificationRule>,
    ) -> Result<Self> {
        validate_url(&url)?;
        if interval == 0 {
            return Err(VigilError::Validation(
                "poll interval must be at least 1 second".to_string(),
            ));
        }
        Ok(Self {
            id: ItemId::new(),
            url,
            title,
            interval,
            enabled,
            notifications: dedupe_rules(notifications),
            history: History::default(),
        })
    }

    /// Label shown in notifications, falling back to the url
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(&self.url)
    }
}

/// Drop repeated rules, keeping the first occurrence of each
pub(crate) fn dedupe_rules(rules: Vec<NotificationRule>) -> Vec<NotificationRule> {
    let mut out: Vec<NotificationRule> = Vec::with_capacity(rules.len());
    for rule in rules {
        if !out.contains(&rule) {
            out.push(rule);
        }
    }
    out
}

/// Check that a url is acceptable for monitoring
///
/// Requires an http or https scheme, a non-empty host, a valid port and
/// none of the characters `<`, `>`, `"`, `|` anywhere in the string.
/// Invalid urls are rejected, never repaired.
pub fn validate_url(url: &str) -> Result<()> {
    if let Some(bad) = url.chars().find(|c| matches!(c, '<' | '>' | '"' | '|')) {
        return Err(VigilError::Validation(format!(
            "url contains forbidden character {bad:?}"
        )));
    }
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| VigilError::Validation(format!("invalid url {url:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(VigilError::Validation(format!(
                "unsupported url scheme {other:?}, expected http or https"
            )));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(VigilError::Validation(format!("url {url:?} has no host")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_urls() {
        assert!(validate_url("http://example.com/status").is_ok());
        assert!(validate_url("https://example.com:8443/a?q=1").is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn rejects_missing_host() {
        assert!(validate_url("http://").is_err());
    }

    #[test]
    fn rejects_out_of_range_port() {
        assert!(validate_url("https://example.com:99999/").is_err());
    }

    #[test]
    fn rejects_forbidden_characters() {
        assert!(validate_url("https://example.com/<script>").is_err());
        assert!(validate_url("https://example.com/a|b").is_err());
        assert!(validate_url("https://example.com/a\"b").is_err());
    }

    #[test]
    fn rejects_unparseable_input() {
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn new_item_rejects_zero_interval() {
        let result = MonitoredItem::new("https://example.com".to_string(), None, 0, true, vec![]);
        assert!(matches!(result, Err(VigilError::Validation(_))));
    }

    #[test]
    fn new_item_rejects_invalid_url() {
        let result = MonitoredItem::new("gopher://example.com".to_string(), None, 60, true, vec![]);
        assert!(matches!(result, Err(VigilError::Validation(_))));
    }

    #[test]
    fn display_title_falls_back_to_url() {
        let item =
            MonitoredItem::new("https://example.com".to_string(), None, 60, true, vec![]).unwrap();
        assert_eq!(item.display_title(), "https://example.com");

        let mut titled = item.clone();
        titled.title = Some("Example".to_string());
        assert_eq!(titled.display_title(), "Example");

        let mut blank = item;
        blank.title = Some(String::new());
        assert_eq!(blank.display_title(), "https://example.com");
    }

    #[test]
    fn duplicate_rules_are_dropped_keeping_order() {
        let item = MonitoredItem::new(
            "https://example.com".to_string(),
            None,
            60,
            true,
            vec![
                NotificationRule::Change,
                NotificationRule::Error,
                NotificationRule::Change,
                NotificationRule::HttpCode { code: 404 },
                NotificationRule::HttpCode { code: 404 },
            ],
        )
        .unwrap();
        assert_eq!(
            item.notifications,
            vec![
                NotificationRule::Change,
                NotificationRule::Error,
                NotificationRule::HttpCode { code: 404 },
            ]
        );
    }

    #[test]
    fn notification_rules_serialize_with_type_tags() {
        let json = serde_json::to_string(&NotificationRule::HttpCode { code: 404 }).unwrap();
        assert_eq!(json, r#"{"type":"http_code","code":404}"#);

        let rule: NotificationRule = serde_json::from_str(r#"{"type":"change"}"#).unwrap();
        assert_eq!(rule, NotificationRule::Change);
    }

    #[test]
    fn item_ids_are_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
    }

    #[test]
    fn item_deserializes_with_defaults() {
        let json = r#"{"id":"00000000-0000-0000-0000-000000000001","url":"https://example.com","interval":60}"#;
        let item: MonitoredItem = serde_json::from_str(json).unwrap();
        assert!(item.enabled);
        assert!(item.title.is_none());
        assert!(item.notifications.is_empty());
        assert!(item.history.entries().is_empty());
    }
}
