//! Warning Notifier
//!
//! Sends a one-time warning email to affected parties before their scheduled
//! deletion. `warning_sent_at` is stamped once per disagreement after all
//! recipients have been attempted, whatever the individual send outcomes: a
//! missed delivery is preferable to a duplicate-warning storm.

use chrono::{Duration, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use crate::email::{warning_body, warning_subject, Mailer};
use crate::shared::models::DisagreementKind;
use crate::store::LegalStore;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct WarningOutcome {
    /// Disagreements attempted this run.
    pub processed: u64,
    /// Individual warning emails delivered.
    pub sent: u64,
    /// Failed sends plus row-level failures.
    pub errors: u64,
}

pub struct WarningNotifier {
    store: Arc<dyn LegalStore>,
    mailer: Arc<dyn Mailer>,
    window: Duration,
    batch_size: usize,
    batch_delay: StdDuration,
    app_url: String,
}

impl WarningNotifier {
    pub fn new(
        store: Arc<dyn LegalStore>,
        mailer: Arc<dyn Mailer>,
        window_days: i64,
        batch_size: usize,
        batch_delay_ms: u64,
        app_url: String,
    ) -> Self {
        Self {
            store,
            mailer,
            window: Duration::days(window_days),
            batch_size: batch_size.max(1),
            batch_delay: StdDuration::from_millis(batch_delay_ms),
            app_url,
        }
    }

    pub async fn run(&self, kind: DisagreementKind) -> WarningOutcome {
        let rows = match self.store.warning_candidates(kind, self.window).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("failed to query {kind} warning candidates: {e}");
                return WarningOutcome {
                    processed: 0,
                    sent: 0,
                    errors: 1,
                };
            }
        };

        let mut outcome = WarningOutcome::default();
        for row in rows {
            outcome.processed += 1;

            let recipients = match self.store.recipients(&row).await {
                Ok(r) => r,
                Err(e) => {
                    // No recipient was attempted, so the row is not stamped
                    // and the next run retries it.
                    warn!("failed to resolve recipients for {}: {e}", row.id);
                    outcome.errors += 1;
                    continue;
                }
            };

            let subject = warning_subject(kind);
            let mut batches = recipients.chunks(self.batch_size).peekable();
            while let Some(batch) = batches.next() {
                for recipient in batch {
                    let body = warning_body(
                        kind,
                        row.document_type,
                        row.deadline_at,
                        recipient.display_name.as_deref(),
                        &self.app_url,
                    );
                    match self.mailer.send(&recipient.email, subject, &body).await {
                        Ok(()) => {
                            outcome.sent += 1;
                            if let Err(e) = self
                                .store
                                .insert_notification(
                                    recipient.user_id,
                                    "deletion_warning",
                                    subject,
                                    &body,
                                )
                                .await
                            {
                                warn!(
                                    "failed to insert notification for {}: {e}",
                                    recipient.user_id
                                );
                            }
                        }
                        Err(e) => {
                            warn!("failed to warn {}: {e}", recipient.email);
                            outcome.errors += 1;
                        }
                    }
                }
                // Pause between groups to stay under provider rate limits.
                if batches.peek().is_some() && !self.batch_delay.is_zero() {
                    tokio::time::sleep(self.batch_delay).await;
                }
            }

            if let Err(e) = self.store.mark_warning_sent(row.id, Utc::now()).await {
                warn!("failed to stamp warning_sent_at for {}: {e}", row.id);
                outcome.errors += 1;
            }
        }

        info!(
            "{kind} warnings: {} processed, {} sent, {} errors",
            outcome.processed, outcome.sent, outcome.errors
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::testing::{disagreement, MockMailer, MockStore};
    use crate::shared::models::Recipient;
    use crate::tests::test_util;
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    fn notifier(store: &Arc<MockStore>, mailer: &Arc<MockMailer>) -> WarningNotifier {
        WarningNotifier::new(
            Arc::clone(store) as Arc<dyn LegalStore>,
            Arc::clone(mailer) as Arc<dyn Mailer>,
            3,
            2,
            0,
            "https://app.example.org".to_string(),
        )
    }

    #[tokio::test]
    async fn test_warning_is_sent_once() {
        test_util::setup();
        let store = Arc::new(MockStore::default());
        let mailer = Arc::new(MockMailer::default());
        let id = store.push(disagreement(
            DisagreementKind::UserDeletion,
            Utc::now() + Duration::days(2),
        ));

        let first = notifier(&store, &mailer)
            .run(DisagreementKind::UserDeletion)
            .await;
        assert_eq!(
            first,
            WarningOutcome {
                processed: 1,
                sent: 1,
                errors: 0
            }
        );
        assert!(store.row(id).warning_sent_at.is_some());
        assert_eq!(store.notifications.lock().unwrap().len(), 1);

        // An immediate second run finds nothing to warn about.
        let second = notifier(&store, &mailer)
            .run(DisagreementKind::UserDeletion)
            .await;
        assert_eq!(second, WarningOutcome::default());
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_church_warning_fans_out_to_members() {
        test_util::setup();
        let store = Arc::new(MockStore::default());
        let mailer = Arc::new(MockMailer::default());
        let row = disagreement(
            DisagreementKind::ChurchDeletion,
            Utc::now() + Duration::days(1),
        );
        let id = store.push(row);
        let members: Vec<Recipient> = (0..3)
            .map(|i| Recipient {
                user_id: Uuid::new_v4(),
                email: format!("member{i}@example.org"),
                display_name: Some(format!("Member {i}")),
            })
            .collect();
        store.recipients_by_row.lock().unwrap().insert(id, members);

        let outcome = notifier(&store, &mailer)
            .run(DisagreementKind::ChurchDeletion)
            .await;
        assert_eq!(
            outcome,
            WarningOutcome {
                processed: 1,
                sent: 3,
                errors: 0
            }
        );
        assert!(store.row(id).warning_sent_at.is_some());
    }

    #[tokio::test]
    async fn test_one_failed_recipient_does_not_block_the_rest() {
        test_util::setup();
        let store = Arc::new(MockStore::default());
        let mailer = Arc::new(MockMailer::default());
        let row = disagreement(
            DisagreementKind::ChurchDeletion,
            Utc::now() + Duration::days(1),
        );
        let id = store.push(row);
        let members: Vec<Recipient> = (0..3)
            .map(|i| Recipient {
                user_id: Uuid::new_v4(),
                email: format!("member{i}@example.org"),
                display_name: None,
            })
            .collect();
        store.recipients_by_row.lock().unwrap().insert(id, members);
        mailer
            .fail_for
            .lock()
            .unwrap()
            .insert("member1@example.org".to_string());

        let outcome = notifier(&store, &mailer)
            .run(DisagreementKind::ChurchDeletion)
            .await;
        assert_eq!(
            outcome,
            WarningOutcome {
                processed: 1,
                sent: 2,
                errors: 1
            }
        );
        // Stamped regardless of individual outcomes.
        assert!(store.row(id).warning_sent_at.is_some());
    }

    #[tokio::test]
    async fn test_recipient_resolution_failure_leaves_row_unstamped() {
        test_util::setup();
        let store = Arc::new(MockStore::default());
        let mailer = Arc::new(MockMailer::default());
        let id = store.push(disagreement(
            DisagreementKind::UserDeletion,
            Utc::now() + Duration::days(2),
        ));
        store.fail_recipients.store(true, Ordering::SeqCst);

        let outcome = notifier(&store, &mailer)
            .run(DisagreementKind::UserDeletion)
            .await;
        assert_eq!(
            outcome,
            WarningOutcome {
                processed: 1,
                sent: 0,
                errors: 1
            }
        );
        assert!(store.row(id).warning_sent_at.is_none());

        // The next run retries once resolution works again.
        store.fail_recipients.store(false, Ordering::SeqCst);
        let retry = notifier(&store, &mailer)
            .run(DisagreementKind::UserDeletion)
            .await;
        assert_eq!(retry.sent, 1);
        assert!(store.row(id).warning_sent_at.is_some());
    }

    #[tokio::test]
    async fn test_rows_outside_the_window_are_ignored() {
        test_util::setup();
        let store = Arc::new(MockStore::default());
        let mailer = Arc::new(MockMailer::default());
        store.push(disagreement(
            DisagreementKind::UserDeletion,
            Utc::now() + Duration::days(10),
        ));
        store.push(disagreement(
            DisagreementKind::UserDeletion,
            Utc::now() - Duration::days(1),
        ));

        let outcome = notifier(&store, &mailer)
            .run(DisagreementKind::UserDeletion)
            .await;
        assert_eq!(outcome, WarningOutcome::default());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_failure_aborts_with_one_error() {
        test_util::setup();
        let store = Arc::new(MockStore::default());
        let mailer = Arc::new(MockMailer::default());
        store.fail_query.store(true, Ordering::SeqCst);

        let outcome = notifier(&store, &mailer)
            .run(DisagreementKind::UserDeletion)
            .await;
        assert_eq!(
            outcome,
            WarningOutcome {
                processed: 0,
                sent: 0,
                errors: 1
            }
        );
    }
}
