//! Canonical inventory feed.
//!
//! A [`FeedSource`] produces the complete snapshot of [`CanonicalItem`]s for
//! one reconciliation cycle. The engine never mutates items; parsing and
//! field mapping of upstream formats happen before this boundary.

mod json;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use json::{JsonFeedSource, parse_items};

/// Named string fields of a listing, ordered by field name.
pub type Attributes = BTreeMap<String, String>;

/// One listing as the inventory system of record describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalItem {
    /// Stable, unique identifier of the watch.
    pub sku: String,
    /// Price, condition, description, images and similar fields.
    #[serde(default)]
    pub attributes: Attributes,
    /// Free-text availability status such as "Available", "Sold" or "On Memo".
    #[serde(default)]
    pub feed_status: String,
}

impl CanonicalItem {
    pub fn new(sku: impl Into<String>, feed_status: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            attributes: Attributes::new(),
            feed_status: feed_status.into(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Errors raised while acquiring a feed snapshot.
///
/// Any of these marks the cycle as feed-down; nothing is mutated.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The source could not be reached or read.
    #[error("Feed unavailable: {message}")]
    Unavailable { message: String },

    /// The source answered but the payload is not a valid snapshot.
    #[error("Feed parse error: {message}")]
    Parse { message: String },
}

impl FeedError {
    #[inline]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[inline]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Producer of the canonical snapshot for the current cycle.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the whole snapshot. Order is preserved but carries no meaning.
    async fn fetch(&self) -> Result<Vec<CanonicalItem>>;
}

/// A fixed snapshot held in memory.
///
/// Useful for replaying a captured feed or driving the engine from code.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    items: Vec<CanonicalItem>,
}

impl StaticFeed {
    pub fn new(items: Vec<CanonicalItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> Result<Vec<CanonicalItem>> {
        Ok(self.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_attr_keeps_attributes_sorted_by_name() {
        let item = CanonicalItem::new("RLX-1", "Available")
            .with_attr("price", "12500")
            .with_attr("brand", "Rolex")
            .with_attr("condition", "Excellent");

        let names: Vec<&str> = item.attributes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["brand", "condition", "price"]);
    }

    #[test]
    fn feed_error_messages() {
        assert!(
            FeedError::unavailable("connection refused")
                .to_string()
                .contains("Feed unavailable")
        );
        assert!(
            FeedError::parse("expected array")
                .to_string()
                .contains("expected array")
        );
    }

    #[tokio::test]
    async fn static_feed_returns_its_items() {
        let feed = StaticFeed::new(vec![CanonicalItem::new("A", "Available")]);
        let items = feed.fetch().await.expect("static feed never fails");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku, "A");
    }
}
