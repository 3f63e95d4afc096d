//! The differencer: feed + mirror (+ remote) → [`ChangeSet`].
//!
//! Pure and deterministic. Decisions are made per SKU, so a SKU lands in
//! at most one set; when both a deactivation and an insert or update would
//! apply, the deactivation wins.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use thiserror::Error;

use crate::channel::RemoteListingRef;
use crate::entity::sync_status::SyncStatus;
use crate::feed::{Attributes, CanonicalItem};
use crate::mirror::{MirrorRecord, MirrorSnapshot};

use super::policy::StatusPolicy;
use super::types::{ChangeSet, DeactivateReason, Deactivation, Reactivation, UpdatePair};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// The snapshot names a SKU more than once; nothing in it can be trusted.
    #[error("Duplicate SKUs in feed: {}", skus.join(", "))]
    DuplicateSku { skus: Vec<String> },
}

/// Every SKU that appears more than once, sorted.
pub fn duplicate_skus(feed: &[CanonicalItem]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(feed.len());
    let mut duplicates = BTreeSet::new();
    for item in feed {
        if !seen.insert(item.sku.as_str()) {
            duplicates.insert(item.sku.clone());
        }
    }
    duplicates.into_iter().collect()
}

/// Field-by-field equality after the policy's normalization.
pub fn attributes_match(policy: &dyn StatusPolicy, cached: &Attributes, feed: &Attributes) -> bool {
    cached.len() == feed.len()
        && cached.iter().all(|(field, old)| {
            feed.get(field)
                .is_some_and(|new| policy.normalize(field, old) == policy.normalize(field, new))
        })
}

fn needs_update(policy: &dyn StatusPolicy, record: &MirrorRecord, item: &CanonicalItem) -> bool {
    record.sync_status == SyncStatus::PublishFailed
        || record.feed_status != item.feed_status
        || !attributes_match(policy, &record.attributes, &item.attributes)
}

/// Compute the change set for one channel.
///
/// `remote` is `None` for channels that cannot enumerate listings; orphan
/// detection, reactivation and purging then never trigger.
///
/// # Errors
/// Returns [`DiffError::DuplicateSku`] listing every duplicated SKU.
pub fn diff(
    feed: &[CanonicalItem],
    mirror: &MirrorSnapshot,
    remote: Option<&[RemoteListingRef]>,
    policy: &dyn StatusPolicy,
) -> Result<ChangeSet, DiffError> {
    let skus = duplicate_skus(feed);
    if !skus.is_empty() {
        return Err(DiffError::DuplicateSku { skus });
    }

    let feed_by_sku: BTreeMap<&str, &CanonicalItem> =
        feed.iter().map(|item| (item.sku.as_str(), item)).collect();
    let remote_refs = remote.unwrap_or_default();
    let remote_by_id: HashMap<&str, &RemoteListingRef> = remote_refs
        .iter()
        .map(|r| (r.remote_id.as_str(), r))
        .collect();
    let remote_skus: HashSet<&str> = remote_refs.iter().filter_map(|r| r.sku.as_deref()).collect();

    let mut cs = ChangeSet::default();

    for (sku, record) in mirror {
        let Some(item) = feed_by_sku.get(sku.as_str()).copied() else {
            if record.sync_status != SyncStatus::Deactivated {
                cs.to_deactivate.push(Deactivation {
                    sku: sku.clone(),
                    remote_id: record.remote_id.clone(),
                    reason: DeactivateReason::Removed,
                });
            } else if remote.is_some() {
                let listed = record
                    .remote_id
                    .as_deref()
                    .is_some_and(|id| remote_by_id.contains_key(id))
                    || remote_skus.contains(sku.as_str());
                if !listed {
                    cs.to_purge.push(sku.clone());
                }
            }
            continue;
        };

        let terminal = policy.is_terminal(&item.feed_status);

        if record.sync_status == SyncStatus::Deactivated {
            if terminal {
                continue;
            }
            let approved = record.remote_id.as_deref().and_then(|id| {
                remote_by_id
                    .get(id)
                    .filter(|r| policy.can_reactivate(r))
                    .map(|_| id)
            });
            match approved {
                Some(remote_id) => cs.to_reactivate.push(Reactivation {
                    remote_id: remote_id.to_string(),
                    item: item.clone(),
                }),
                None => cs.to_insert.push(item.clone()),
            }
            continue;
        }

        if terminal {
            cs.to_deactivate.push(Deactivation {
                sku: sku.clone(),
                remote_id: record.remote_id.clone(),
                reason: DeactivateReason::Terminal,
            });
            continue;
        }

        match record.remote_id.as_deref() {
            Some(remote_id) if record.is_active() => {
                if needs_update(policy, record, item) {
                    cs.to_update.push(UpdatePair {
                        remote_id: remote_id.to_string(),
                        old: record.attributes.clone(),
                        new: item.clone(),
                    });
                }
            }
            _ => cs.to_insert.push(item.clone()),
        }
    }

    for (sku, item) in &feed_by_sku {
        if !mirror.contains_key(*sku) && !policy.is_terminal(&item.feed_status) {
            cs.to_insert.push((*item).clone());
        }
    }

    if remote.is_some() {
        let known_ids: HashSet<&str> = mirror
            .values()
            .filter_map(|r| r.remote_id.as_deref())
            .collect();

        for listing in remote_refs.iter().filter(|r| r.remote_status.is_live()) {
            if known_ids.contains(listing.remote_id.as_str()) {
                continue;
            }
            if let Some(sku) = listing.sku.as_deref()
                && mirror.contains_key(sku)
            {
                continue;
            }

            let sku = listing
                .sku
                .clone()
                .unwrap_or_else(|| format!("remote:{}", listing.remote_id));
            cs.to_insert.retain(|item| item.sku != sku);
            cs.to_deactivate.push(Deactivation {
                sku,
                remote_id: Some(listing.remote_id.clone()),
                reason: DeactivateReason::Orphan,
            });
        }
    }

    cs.to_insert.sort_by(|a, b| a.sku.cmp(&b.sku));
    cs.to_update.sort_by(|a, b| a.sku().cmp(b.sku()));
    cs.to_deactivate
        .sort_by(|a, b| (&a.sku, &a.remote_id).cmp(&(&b.sku, &b.remote_id)));
    cs.to_reactivate.sort_by(|a, b| a.item.sku.cmp(&b.item.sku));
    cs.to_purge.sort();

    Ok(cs)
}
