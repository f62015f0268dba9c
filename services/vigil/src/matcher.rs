//! Evaluation of notification rules against a check result

use crate::item::NotificationRule;
use crate::outcome::{RequestResult, Status};

/// Pick the rule that fires for `result`, if any
///
/// Precedence is fixed regardless of the order rules were configured in:
/// `Error` over `Change` over `Success` over `HttpCode` rules, the latter
/// tried in ascending code order. At most one rule fires; dispatching the
/// notification is the caller's job.
pub fn evaluate(rules: &[NotificationRule], result: &RequestResult) -> Option<NotificationRule> {
    if rules.contains(&NotificationRule::Error)
        && matches!(
            result.status(),
            Status::ClientError | Status::ServerError | Status::TransferError
        )
    {
        return Some(NotificationRule::Error);
    }

    if rules.contains(&NotificationRule::Change)
        && result
            .diff
            .as_ref()
            .is_some_and(|diff| !diff.changes.is_empty())
    {
        return Some(NotificationRule::Change);
    }

    if rules.contains(&NotificationRule::Success) && matches!(result.status_code, Some(100..=399)) {
        return Some(NotificationRule::Success);
    }

    let mut codes: Vec<u16> = rules
        .iter()
        .filter_map(|rule| match rule {
            NotificationRule::HttpCode { code } => Some(*code),
            _ => None,
        })
        .collect();
    codes.sort_unstable();
    codes
        .into_iter()
        .find(|code| result.status_code == Some(*code))
        .map(|code| NotificationRule::HttpCode { code })
}
