//! Neutral JSON feed format.
//!
//! The payload is either a bare array or an object with an `items` array:
//!
//! ```json
//! [
//!   {"sku": "RLX-116610", "status": "Available",
//!    "attributes": {"brand": "Rolex", "price": 12500, "box": true}}
//! ]
//! ```
//!
//! `status` may also be spelled `feed_status`. Non-string attribute values
//! are stored in their JSON text form (`12500`, `true`); `null` is dropped.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::http::{HttpRequest, HttpTransport};

use super::{Attributes, CanonicalItem, FeedError, FeedSource, Result};

enum Location {
    File(PathBuf),
    Http {
        url: String,
        token: Option<String>,
        transport: Arc<dyn HttpTransport>,
    },
}

/// Feed source reading the neutral JSON format from disk or over HTTP.
pub struct JsonFeedSource {
    location: Location,
}

impl JsonFeedSource {
    /// Read the snapshot from a local file on every fetch.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
        }
    }

    /// Download the snapshot with a GET request on every fetch.
    pub fn http(
        url: impl Into<String>,
        token: Option<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            location: Location::Http {
                url: url.into(),
                token,
                transport,
            },
        }
    }

    async fn read_raw(&self) -> Result<Vec<u8>> {
        match &self.location {
            Location::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| FeedError::unavailable(format!("{}: {e}", path.display()))),
            Location::Http {
                url,
                token,
                transport,
            } => {
                let request = HttpRequest::get(url.as_str()).bearer(token.as_deref());
                let response = transport
                    .send(request)
                    .await
                    .map_err(|e| FeedError::unavailable(e.to_string()))?;
                if !response.is_success() {
                    return Err(FeedError::unavailable(format!(
                        "GET {url} returned HTTP {}",
                        response.status
                    )));
                }
                Ok(response.body)
            }
        }
    }
}

#[async_trait]
impl FeedSource for JsonFeedSource {
    async fn fetch(&self) -> Result<Vec<CanonicalItem>> {
        let raw = self.read_raw().await?;
        let items = parse_items(&raw)?;
        tracing::debug!(count = items.len(), "Fetched feed snapshot");
        Ok(items)
    }
}

/// Parse a neutral JSON feed payload.
///
/// # Errors
/// Returns [`FeedError::Parse`] when the payload is not valid JSON, is not
/// an array of objects, or an entry lacks a SKU.
pub fn parse_items(raw: &[u8]) -> Result<Vec<CanonicalItem>> {
    let root: Value =
        serde_json::from_slice(raw).map_err(|e| FeedError::parse(e.to_string()))?;

    let entries = match root {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => match obj.remove("items") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(FeedError::parse("expected an `items` array")),
        },
        _ => return Err(FeedError::parse("expected a JSON array of items")),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| parse_entry(index, entry))
        .collect()
}

fn parse_entry(index: usize, entry: Value) -> Result<CanonicalItem> {
    let Value::Object(mut obj) = entry else {
        return Err(FeedError::parse(format!("item {index} is not an object")));
    };

    let sku = match obj.remove("sku") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(FeedError::parse(format!("item {index} has no sku"))),
    };

    let feed_status = obj
        .remove("status")
        .or_else(|| obj.remove("feed_status"))
        .and_then(scalar_text)
        .unwrap_or_default();

    let mut attributes = Attributes::new();
    match obj.remove("attributes") {
        Some(Value::Object(fields)) => {
            for (name, value) in fields {
                if let Some(text) = scalar_text(value) {
                    attributes.insert(name, text);
                }
            }
        }
        None | Some(Value::Null) => {}
        Some(_) => {
            return Err(FeedError::parse(format!(
                "item {index} ({sku}) has non-object attributes"
            )));
        }
    }

    Ok(CanonicalItem {
        sku,
        attributes,
        feed_status,
    })
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport};

    #[test]
    fn parses_bare_array_with_mixed_attribute_types() {
        let raw = br#"[
            {"sku": "RLX-1", "status": "Available",
             "attributes": {"brand": "Rolex", "price": 12500, "box": true, "notes": null,
                            "images": ["a.jpg", "b.jpg"]}}
        ]"#;

        let items = parse_items(raw).expect("valid feed");
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.sku, "RLX-1");
        assert_eq!(item.feed_status, "Available");
        assert_eq!(item.attributes.get("price").map(String::as_str), Some("12500"));
        assert_eq!(item.attributes.get("box").map(String::as_str), Some("true"));
        assert_eq!(
            item.attributes.get("images").map(String::as_str),
            Some(r#"["a.jpg","b.jpg"]"#)
        );
        assert!(!item.attributes.contains_key("notes"));
    }

    #[test]
    fn parses_items_envelope_and_feed_status_alias() {
        let raw = br#"{"items": [{"sku": 4711, "feed_status": "On Memo"}]}"#;
        let items = parse_items(raw).expect("valid feed");
        assert_eq!(items[0].sku, "4711");
        assert_eq!(items[0].feed_status, "On Memo");
        assert!(items[0].attributes.is_empty());
    }

    #[test]
    fn rejects_entries_without_sku() {
        let err = parse_items(br#"[{"status": "Available"}]"#).expect_err("missing sku");
        assert!(matches!(err, FeedError::Parse { .. }));
        assert!(err.to_string().contains("item 0"));
    }

    #[test]
    fn rejects_non_array_payload() {
        let err = parse_items(br#""nope""#).expect_err("not an array");
        assert!(matches!(err, FeedError::Parse { .. }));
    }

    #[test]
    fn keeps_duplicates_for_the_differencer_to_reject() {
        let raw = br#"[{"sku": "A"}, {"sku": "A"}]"#;
        assert_eq!(parse_items(raw).expect("valid feed").len(), 2);
    }

    #[tokio::test]
    async fn file_source_reads_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("feed.json");
        std::fs::write(&path, br#"[{"sku": "A", "status": "Available"}]"#).expect("write feed");

        let items = JsonFeedSource::file(&path).fetch().await.expect("fetch");
        assert_eq!(items[0].sku, "A");
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = JsonFeedSource::file(dir.path().join("absent.json"))
            .fetch()
            .await
            .expect_err("missing file");
        assert!(matches!(err, FeedError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn http_source_sends_bearer_and_maps_errors() {
        let transport = MockTransport::new();
        let url = "https://inventory.example.com/feed.json";
        transport.push(HttpMethod::Get, url, 200, r#"[{"sku": "A"}]"#);
        transport.push(HttpMethod::Get, url, 503, "maintenance");

        let source = JsonFeedSource::http(url, Some("secret".into()), Arc::new(transport.clone()));

        let items = source.fetch().await.expect("first fetch");
        assert_eq!(items.len(), 1);
        let err = source.fetch().await.expect_err("second fetch fails");
        assert!(matches!(err, FeedError::Unavailable { .. }));
        assert!(err.to_string().contains("503"));

        let requests = transport.requests();
        assert_eq!(
            crate::http::header_get(&requests[0].headers, "authorization"),
            Some("Bearer secret")
        );
    }
}
