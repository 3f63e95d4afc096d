//! Per-channel status rules.
//!
//! Which feed statuses end a listing, which remote states allow bringing an
//! ended listing back, and how attribute values are compared all differ by
//! channel; the differencer only asks a [`StatusPolicy`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channel::{RemoteListingRef, RemoteStatus};

/// Feed statuses that end a listing unless configured otherwise.
pub const DEFAULT_TERMINAL_STATUSES: [&str; 2] = ["sold", "on memo"];

/// Status predicates consulted by the differencer.
pub trait StatusPolicy: Send + Sync {
    /// Whether a feed status means the item must not be listed.
    fn is_terminal(&self, feed_status: &str) -> bool;

    /// Whether an ended listing may be brought back given its remote state.
    fn can_reactivate(&self, remote: &RemoteListingRef) -> bool;

    /// Comparison form of one attribute value.
    fn normalize(&self, field: &str, value: &str) -> String;
}

/// What happens to a mirror record after its listing is ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Remove the record.
    #[default]
    Delete,
    /// Keep it as `Deactivated` so the listing can be reactivated later.
    Archive,
}

/// Per-field value normalization before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    Trim,
    Lowercase,
}

/// Configurable [`StatusPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultStatusPolicy {
    /// Terminal feed statuses, matched case-insensitively.
    pub terminal_statuses: Vec<String>,
    /// Remote states that allow reactivation.
    pub reactivate_on: Vec<RemoteStatus>,
    /// Normalizations applied per attribute name.
    pub normalize: BTreeMap<String, Vec<Normalization>>,
}

impl Default for DefaultStatusPolicy {
    fn default() -> Self {
        Self {
            terminal_statuses: DEFAULT_TERMINAL_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reactivate_on: vec![RemoteStatus::Approved],
            normalize: BTreeMap::new(),
        }
    }
}

/// Canonical spelling of a feed status: lowercase, `_`/`-` as spaces,
/// single-spaced.
fn fold_status(status: &str) -> String {
    status
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl StatusPolicy for DefaultStatusPolicy {
    fn is_terminal(&self, feed_status: &str) -> bool {
        let folded = fold_status(feed_status);
        self.terminal_statuses
            .iter()
            .any(|terminal| fold_status(terminal) == folded)
    }

    fn can_reactivate(&self, remote: &RemoteListingRef) -> bool {
        self.reactivate_on.contains(&remote.remote_status)
    }

    fn normalize(&self, field: &str, value: &str) -> String {
        let Some(steps) = self.normalize.get(field) else {
            return value.to_string();
        };
        steps
            .iter()
            .fold(value.to_string(), |acc, step| match step {
                Normalization::Trim => acc.trim().to_string(),
                Normalization::Lowercase => acc.to_lowercase(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(status: RemoteStatus) -> RemoteListingRef {
        RemoteListingRef {
            remote_id: "1".into(),
            sku: Some("A".into()),
            remote_status: status,
        }
    }

    #[test]
    fn terminal_statuses_ignore_case_and_separators() {
        let policy = DefaultStatusPolicy::default();
        assert!(policy.is_terminal("Sold"));
        assert!(policy.is_terminal("ON MEMO"));
        assert!(policy.is_terminal("on_memo"));
        assert!(policy.is_terminal("  On  Memo "));
        assert!(!policy.is_terminal("Available"));
        assert!(!policy.is_terminal(""));
    }

    #[test]
    fn reactivation_requires_configured_remote_state() {
        let policy = DefaultStatusPolicy::default();
        assert!(policy.can_reactivate(&remote(RemoteStatus::Approved)));
        assert!(!policy.can_reactivate(&remote(RemoteStatus::Pending)));
        assert!(!policy.can_reactivate(&remote(RemoteStatus::Rejected)));
    }

    #[test]
    fn normalization_applies_only_to_configured_fields() {
        let mut policy = DefaultStatusPolicy::default();
        policy.normalize.insert(
            "brand".into(),
            vec![Normalization::Trim, Normalization::Lowercase],
        );

        assert_eq!(policy.normalize("brand", "  Rolex "), "rolex");
        assert_eq!(policy.normalize("model", "  Submariner "), "  Submariner ");
    }

    #[test]
    fn deserializes_partial_config() {
        let policy: DefaultStatusPolicy = serde_json::from_str(
            r#"{"terminal_statuses": ["Sold", "Reserved"], "normalize": {"title": ["trim"]}}"#,
        )
        .expect("valid policy");
        assert!(policy.is_terminal("reserved"));
        assert!(!policy.is_terminal("on memo"));
        assert_eq!(policy.reactivate_on, vec![RemoteStatus::Approved]);
    }

    #[test]
    fn retention_defaults_to_delete() {
        assert_eq!(Retention::default(), Retention::Delete);
    }
}
