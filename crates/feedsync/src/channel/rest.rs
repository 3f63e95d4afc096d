//! Generic JSON REST channel.
//!
//! Resource layout, relative to the configured base URL:
//!
//! | Operation     | Request                                  |
//! |---------------|------------------------------------------|
//! | create        | `POST /listings` → `{"id": ...}`         |
//! | update        | `PUT /listings/{id}`                     |
//! | deactivate    | `POST /listings/{id}/end`                |
//! | reactivate    | `POST /listings/{id}/relist`             |
//! | list_active   | `GET /listings[?cursor=]`                |
//!
//! Listing pages are `{"listings": [{"id", "sku", "status"}], "next_cursor"}`
//! or a bare array.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::feed::CanonicalItem;
use crate::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport, join_url};

use super::errors::{ChannelError, Result};
use super::types::{ChannelAdapter, RemoteListingRef, RemoteStatus};

/// Stop following cursors after this many pages.
const MAX_LIST_PAGES: usize = 200;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Update,
    Deactivate,
    Reactivate,
    List,
}

/// A channel speaking the neutral JSON REST layout.
#[derive(Clone)]
pub struct RestChannel {
    name: String,
    base_url: String,
    token: Option<String>,
    transport: Arc<dyn HttpTransport>,
    enumerable: bool,
}

impl RestChannel {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            token: None,
            transport,
            enumerable: true,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Whether `GET /listings` exists on this channel.
    #[must_use]
    pub fn with_enumeration(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn payload(item: &CanonicalItem) -> Value {
        json!({
            "sku": item.sku,
            "status": item.feed_status,
            "attributes": item.attributes,
        })
    }

    async fn send(
        &self,
        op: Operation,
        subject: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse> {
        let request = request.bearer(self.token.as_deref());
        let response = self
            .transport
            .send(request)
            .await
            .map_err(map_http_error)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(classify_response(op, subject, &response))
        }
    }

    async fn post_json(
        &self,
        op: Operation,
        subject: &str,
        path: &str,
        body: &Value,
    ) -> Result<HttpResponse> {
        let request = HttpRequest::new(HttpMethod::Post, self.url(path))
            .json(body)
            .map_err(map_http_error)?;
        self.send(op, subject, request).await
    }
}

#[derive(Deserialize)]
struct CreatedListing {
    id: Value,
}

#[derive(Deserialize)]
struct ListingEntry {
    id: Value,
    #[serde(default)]
    sku: Option<String>,
    status: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListingPage {
    Envelope {
        listings: Vec<ListingEntry>,
        #[serde(default)]
        next_cursor: Option<String>,
    },
    Bare(Vec<ListingEntry>),
}

fn id_text(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ChannelAdapter for RestChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, item: &CanonicalItem) -> Result<String> {
        let response = self
            .post_json(Operation::Create, &item.sku, "listings", &Self::payload(item))
            .await?;
        let created: CreatedListing = response.json().map_err(map_http_error)?;
        id_text(&created.id)
            .ok_or_else(|| ChannelError::internal(format!("create for {} returned no id", item.sku)))
    }

    async fn update(&self, remote_id: &str, item: &CanonicalItem) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Put, self.url(&format!("listings/{remote_id}")))
            .json(&Self::payload(item))
            .map_err(map_http_error)?;
        self.send(Operation::Update, remote_id, request).await?;
        Ok(())
    }

    async fn deactivate(&self, remote_id: &str) -> Result<()> {
        self.post_json(
            Operation::Deactivate,
            remote_id,
            &format!("listings/{remote_id}/end"),
            &json!({}),
        )
        .await?;
        Ok(())
    }

    async fn reactivate(&self, remote_id: &str, item: &CanonicalItem) -> Result<()> {
        self.post_json(
            Operation::Reactivate,
            remote_id,
            &format!("listings/{remote_id}/relist"),
            &Self::payload(item),
        )
        .await?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Option<Vec<RemoteListingRef>>> {
        if !self.enumerable {
            return Ok(None);
        }

        let mut refs = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let path = match &cursor {
                Some(c) => format!("listings?cursor={c}"),
                None => "listings".to_string(),
            };
            let response = self
                .send(Operation::List, "listings", HttpRequest::get(self.url(&path)))
                .await?;
            let page: ListingPage = response.json().map_err(map_http_error)?;
            let (entries, next) = match page {
                ListingPage::Envelope {
                    listings,
                    next_cursor,
                } => (listings, next_cursor),
                ListingPage::Bare(listings) => (listings, None),
            };

            for entry in entries {
                let Some(remote_id) = id_text(&entry.id) else {
                    tracing::warn!(channel = %self.name, "Skipping listing without id");
                    continue;
                };
                let remote_status = entry.status.parse::<RemoteStatus>().unwrap_or_else(|_| {
                    tracing::warn!(
                        channel = %self.name,
                        remote_id = %remote_id,
                        status = %entry.status,
                        "Unrecognized listing status"
                    );
                    RemoteStatus::Unknown
                });
                refs.push(RemoteListingRef {
                    remote_id,
                    sku: entry.sku.filter(|s| !s.is_empty()),
                    remote_status,
                });
            }

            match next {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(Some(refs)),
            }
        }

        Err(ChannelError::internal(format!(
            "listing enumeration exceeded {MAX_LIST_PAGES} pages"
        )))
    }
}

fn map_http_error(e: HttpError) -> ChannelError {
    match e {
        HttpError::Timeout(message) => ChannelError::timeout(message),
        HttpError::Transport(message) => ChannelError::network(message),
        other => ChannelError::internal(other.to_string()),
    }
}

fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("Retry-After")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn body_summary(response: &HttpResponse) -> String {
    let text = response.text();
    let first = text.lines().next().unwrap_or_default().trim();
    if first.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        format!("HTTP {}: {}", response.status, first)
    }
}

/// Map a non-2xx response onto the channel error taxonomy.
fn classify_response(op: Operation, subject: &str, response: &HttpResponse) -> ChannelError {
    match response.status {
        429 => ChannelError::RateLimited {
            retry_after: retry_after(response),
        },
        401 | 419 | 440 => ChannelError::session(body_summary(response)),
        408 | 504 => ChannelError::timeout(body_summary(response)),
        409 | 410 if op == Operation::Deactivate => ChannelError::AlreadyEnded {
            remote_id: subject.to_string(),
        },
        404 | 410 => ChannelError::not_found(subject.to_string()),
        500..=599 => ChannelError::network(body_summary(response)),
        _ => ChannelError::rejected(body_summary(response)),
    }
}
