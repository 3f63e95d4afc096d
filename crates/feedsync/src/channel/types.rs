use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::feed::CanonicalItem;

use super::errors::Result;

/// Listing state as reported by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Active,
    Inactive,
    /// Accepted by a curated (B2B) channel; eligible for reactivation.
    Approved,
    Pending,
    Rejected,
    /// Status text the adapter could not map. The listing still exists.
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    /// Whether the listing currently occupies a slot on the channel.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(
            self,
            RemoteStatus::Active | RemoteStatus::Approved | RemoteStatus::Pending
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteStatus::Active => "active",
            RemoteStatus::Inactive => "inactive",
            RemoteStatus::Approved => "approved",
            RemoteStatus::Pending => "pending",
            RemoteStatus::Rejected => "rejected",
            RemoteStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RemoteStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "live" | "published" => Ok(RemoteStatus::Active),
            "inactive" | "ended" | "closed" => Ok(RemoteStatus::Inactive),
            "approved" | "accepted" => Ok(RemoteStatus::Approved),
            "pending" | "in_review" => Ok(RemoteStatus::Pending),
            "rejected" | "declined" => Ok(RemoteStatus::Rejected),
            _ => Err(format!("Unknown remote status: {}", s)),
        }
    }
}

/// One listing as enumerated from the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListingRef {
    /// The channel's own identifier.
    pub remote_id: String,
    /// SKU, when the channel echoes it back.
    pub sku: Option<String>,
    pub remote_status: RemoteStatus,
}

/// Gateway to one sales channel.
///
/// Adapters translate canonical items into the channel's payloads and map
/// the channel's failures onto [`ChannelError`](super::ChannelError) so the
/// executor can classify them.
///
/// # Implementation Notes
///
/// Implementors should:
/// - Return [`ChannelError::AlreadyEnded`](super::ChannelError::AlreadyEnded)
///   when ending a listing that is already closed
/// - Return `Ok(None)` from [`list_active`](Self::list_active) when the
///   channel cannot enumerate its listings
/// - Enumerate ended listings too, and report statuses they cannot map as
///   [`RemoteStatus::Unknown`] rather than dropping the listing
/// - Not retry internally; retry and backoff belong to the executor
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Channel partition name, used as the mirror key prefix.
    fn name(&self) -> &str;

    /// Publish a new listing and return its remote id.
    async fn create(&self, item: &CanonicalItem) -> Result<String>;

    /// Replace the listing's attributes with the item's.
    async fn update(&self, remote_id: &str, item: &CanonicalItem) -> Result<()>;

    /// End (delist) the listing.
    async fn deactivate(&self, remote_id: &str) -> Result<()>;

    /// Bring an ended listing back with the item's current attributes.
    async fn reactivate(&self, remote_id: &str, item: &CanonicalItem) -> Result<()>;

    /// Enumerate every listing the channel holds, live or not, or `None`
    /// without enumeration. A record absent from this list is treated as
    /// gone from the channel.
    async fn list_active(&self) -> Result<Option<Vec<RemoteListingRef>>>;
}
