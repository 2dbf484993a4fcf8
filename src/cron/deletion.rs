//! Deletion Processor
//!
//! Finds every disagreement whose deadline has passed while still pending
//! and irrevocably applies its consequence. Rows are claimed with a single
//! conditional update, so overlapping scheduler triggers cannot process the
//! same row twice. Every claimed row ends in `completed` even when a step
//! fails: a disagreement must never stay pending past its deadline and
//! retry-loop daily.

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::shared::models::{DisagreementKind, LegalDisagreement};
use crate::store::{LegalStore, StoreError};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Rows claimed and attempted this run.
    pub processed: u64,
    /// Rows whose full consequence succeeded.
    pub deleted: u64,
    /// Rows that hit any failure branch. `processed = deleted + errors`.
    pub errors: u64,
}

pub struct DeletionProcessor {
    store: Arc<dyn LegalStore>,
}

impl DeletionProcessor {
    pub fn new(store: Arc<dyn LegalStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self, kind: DisagreementKind) -> PipelineOutcome {
        let rows = match self.store.expired_pending(kind).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("failed to query expired {kind} disagreements: {e}");
                return PipelineOutcome {
                    processed: 0,
                    deleted: 0,
                    errors: 1,
                };
            }
        };

        if rows.is_empty() {
            return PipelineOutcome::default();
        }

        let mut outcome = PipelineOutcome::default();
        for row in rows {
            match self.store.claim_pending(row.id).await {
                Ok(true) => {}
                Ok(false) => {
                    // Another invocation owns the row.
                    continue;
                }
                Err(e) => {
                    // The row was never claimed, so it stays pending and the
                    // next scheduled run will pick it up.
                    warn!("failed to claim disagreement {}: {e}", row.id);
                    outcome.processed += 1;
                    outcome.errors += 1;
                    continue;
                }
            }

            outcome.processed += 1;
            match self.execute(&row).await {
                Ok(()) => match self.store.mark_completed(row.id, Utc::now()).await {
                    Ok(()) => outcome.deleted += 1,
                    Err(e) => {
                        warn!("failed to complete disagreement {}: {e}", row.id);
                        outcome.errors += 1;
                    }
                },
                Err(e) => {
                    warn!("disagreement {} failed: {e}", row.id);
                    outcome.errors += 1;
                    // Force the terminal state anyway. A partially processed
                    // row is preferable to one that is reprocessed forever.
                    if let Err(e) = self.store.mark_completed(row.id, Utc::now()).await {
                        warn!("failed to force-complete disagreement {}: {e}", row.id);
                    }
                }
            }
        }

        info!(
            "{kind} deletions: {} processed, {} deleted, {} errors",
            outcome.processed, outcome.deleted, outcome.errors
        );
        outcome
    }

    async fn execute(&self, row: &LegalDisagreement) -> Result<(), StoreError> {
        match row.disagreement_type {
            DisagreementKind::UserDeletion => {
                // Anonymization is a precondition for identity deletion; a
                // failure here skips the destructive step entirely.
                if let Some(profile_id) = row.profile_id {
                    self.store.anonymize_profile(profile_id).await?;
                }
                self.store.delete_identity(row.user_id).await?;
            }
            DisagreementKind::ChurchDeletion => {
                let church_id = row.church_id.ok_or_else(|| {
                    StoreError::Inconsistent(format!(
                        "church disagreement {} has no church_id",
                        row.id
                    ))
                })?;
                self.store.deactivate_church(church_id).await?;
            }
        }
        Ok(())
    }
}
