//! Item sync state machine.
//!
//! ```text
//! New            --QueueInsert-->  WaitingPublish
//! PublishFailed  --QueueInsert-->  WaitingPublish
//! PublishFailed  --QueueUpdate-->  WaitingPublish
//! Published      --QueueUpdate-->  ChangedWaitingUpdate
//! WaitingPublish, ChangedWaitingUpdate  --Succeeded-->  Published
//! WaitingPublish, ChangedWaitingUpdate  --Failed----->  PublishFailed
//! Published, PublishFailed  --Deactivate-->  Deactivated
//! Deactivated    --Reactivate-->   WaitingPublish
//! ```
//!
//! `WaitingPublish` and `ChangedWaitingUpdate` are in-flight states; only
//! `Published`, `PublishFailed` and `Deactivated` are ever persisted.

use thiserror::Error;

use crate::entity::sync_status::SyncStatus;

/// Something that happened to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// A create (or a re-push after a failure) was scheduled.
    QueueInsert,
    /// An attribute change was scheduled.
    QueueUpdate,
    /// The channel accepted the pending write.
    Succeeded,
    /// The channel rejected the pending write.
    Failed,
    /// The listing was ended on the channel.
    Deactivate,
    /// An ended listing was brought back.
    Reactivate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid sync transition: {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: SyncStatus,
    pub event: SyncEvent,
}

impl SyncStatus {
    /// Apply `event`, returning the next status.
    ///
    /// # Errors
    /// Returns [`InvalidTransition`] for moves the lifecycle does not allow.
    pub fn apply(self, event: SyncEvent) -> Result<SyncStatus, InvalidTransition> {
        use SyncEvent as E;
        use SyncStatus as S;

        let next = match (self, event) {
            (S::New | S::PublishFailed, E::QueueInsert) => S::WaitingPublish,
            (S::PublishFailed, E::QueueUpdate) => S::WaitingPublish,
            (S::Published, E::QueueUpdate) => S::ChangedWaitingUpdate,
            (S::WaitingPublish | S::ChangedWaitingUpdate, E::Succeeded) => S::Published,
            (S::WaitingPublish | S::ChangedWaitingUpdate, E::Failed) => S::PublishFailed,
            (S::Published | S::PublishFailed, E::Deactivate) => S::Deactivated,
            (S::Deactivated, E::Reactivate) => S::WaitingPublish,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}
