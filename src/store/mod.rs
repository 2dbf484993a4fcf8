pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::shared::models::{DisagreementKind, LegalDisagreement, Recipient};

pub use pg::PgLegalStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("blocking task failed: {0}")]
    Runtime(String),
    #[error("inconsistent row: {0}")]
    Inconsistent(String),
}

/// Persistence gateway for the disagreement pipelines. Every method is one
/// independent call against the store; there is no cross-call transaction.
#[async_trait]
pub trait LegalStore: Send + Sync {
    /// Disagreements with `status = pending` whose deadline has passed.
    async fn expired_pending(
        &self,
        kind: DisagreementKind,
    ) -> Result<Vec<LegalDisagreement>, StoreError>;

    /// Atomically claim a pending disagreement by flipping it to
    /// `processing`. Returns false when the row was not pending anymore,
    /// i.e. another invocation owns it.
    async fn claim_pending(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Terminal transition: `status = completed`, `processed_at` stamped.
    async fn mark_completed(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Replace the profile's name fields with the fixed placeholder and
    /// null out email, phone, avatar and address.
    async fn anonymize_profile(&self, profile_id: Uuid) -> Result<(), StoreError>;

    /// Delete the underlying authentication identity.
    async fn delete_identity(&self, user_id: Uuid) -> Result<(), StoreError>;

    /// Deactivate the tenant and cascade membership removal.
    async fn deactivate_church(&self, church_id: Uuid) -> Result<(), StoreError>;

    /// Pending, unwarned disagreements whose deadline falls inside
    /// `(now, now + window]`.
    async fn warning_candidates(
        &self,
        kind: DisagreementKind,
        window: Duration,
    ) -> Result<Vec<LegalDisagreement>, StoreError>;

    /// Stamp `warning_sent_at` so the warning is never resent.
    async fn mark_warning_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Resolve warning recipients: the user alone for user deletions, every
    /// member of the church for church deletions.
    async fn recipients(
        &self,
        disagreement: &LegalDisagreement,
    ) -> Result<Vec<Recipient>, StoreError>;

    /// Best-effort in-app notification row.
    async fn insert_notification(
        &self,
        user_id: Uuid,
        kind: &str,
        title: &str,
        body: &str,
    ) -> Result<(), StoreError>;
}
