//! Scheduler-triggered endpoints.
//!
//! Every route runs the same gate: rate limit on the forwarded client IP
//! (category `cron`), then constant-time secret verification, then one
//! pipeline run. The pipelines never panic outward; the handlers only
//! translate outcomes into the JSON the scheduler expects.

pub mod deletion;
pub mod secret;
pub mod warnings;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::error;
use serde_json::json;
use std::sync::Arc;

use crate::cron::deletion::DeletionProcessor;
use crate::cron::secret::{CronAuthError, CronSecretVerifier};
use crate::cron::warnings::WarningNotifier;
use crate::shared::models::DisagreementKind;
use crate::shared::state::AppState;

pub fn configure_cron_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/cron/process-user-deletions",
            get(handle_process_user_deletions),
        )
        .route(
            "/api/cron/process-church-deletions",
            get(handle_process_church_deletions),
        )
        .route(
            "/api/cron/send-user-deletion-warnings",
            get(handle_send_user_deletion_warnings),
        )
        .route(
            "/api/cron/send-church-deletion-warnings",
            get(handle_send_church_deletion_warnings),
        )
}

/// Extract the caller identifier from proxy headers.
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip) = value.split(',').next() {
                return ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return value.to_string();
        }
    }

    "unknown".to_string()
}

/// Rate limit and secret checks shared by every cron route. `None` means the
/// request may proceed.
async fn gate(state: &AppState, headers: &HeaderMap) -> Option<Response> {
    let ip = client_ip(headers);
    if !state.rate_limit.check_cron(&ip).await {
        return Some(
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, "60")],
                Json(json!({
                    "error": "rate_limit_exceeded",
                    "retry_after": 60
                })),
            )
                .into_response(),
        );
    }

    let verifier = CronSecretVerifier::new(state.config.cron.secret.clone());
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match verifier.verify(auth) {
        Ok(()) => None,
        Err(CronAuthError::MissingSecret) => {
            error!("CRON_SECRET is not configured; refusing cron request");
            Some(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response(),
            )
        }
        Err(CronAuthError::Unauthorized) => Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
        ),
    }
}

async fn run_deletions(
    state: Arc<AppState>,
    headers: HeaderMap,
    kind: DisagreementKind,
) -> Response {
    if let Some(rejection) = gate(&state, &headers).await {
        return rejection;
    }

    let outcome = DeletionProcessor::new(Arc::clone(&state.store))
        .run(kind)
        .await;
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "processed": outcome.processed,
            "deleted": outcome.deleted,
            "errors": outcome.errors,
        })),
    )
        .into_response()
}

async fn run_warnings(
    state: Arc<AppState>,
    headers: HeaderMap,
    kind: DisagreementKind,
) -> Response {
    if let Some(rejection) = gate(&state, &headers).await {
        return rejection;
    }

    let notifier = WarningNotifier::new(
        Arc::clone(&state.store),
        Arc::clone(&state.mailer),
        state.config.cron.warning_window_days,
        state.config.cron.warning_batch_size,
        state.config.cron.warning_batch_delay_ms,
        state.config.app_url.clone(),
    );
    let outcome = notifier.run(kind).await;
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "processed": outcome.processed,
            "sent": outcome.sent,
            "errors": outcome.errors,
        })),
    )
        .into_response()
}

pub async fn handle_process_user_deletions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    run_deletions(state, headers, DisagreementKind::UserDeletion).await
}

pub async fn handle_process_church_deletions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    run_deletions(state, headers, DisagreementKind::ChurchDeletion).await
}

pub async fn handle_send_user_deletion_warnings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    run_warnings(state, headers, DisagreementKind::UserDeletion).await
}

pub async fn handle_send_church_deletion_warnings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    run_warnings(state, headers, DisagreementKind::ChurchDeletion).await
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    use crate::email::{MailError, Mailer};
    use crate::shared::models::{
        DisagreementKind, DisagreementStatus, DocumentKind, LegalDisagreement, Recipient,
    };
    use crate::store::{LegalStore, StoreError};

    pub fn disagreement(
        kind: DisagreementKind,
        deadline_at: DateTime<Utc>,
    ) -> LegalDisagreement {
        LegalDisagreement {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            profile_id: Some(Uuid::new_v4()),
            church_id: match kind {
                DisagreementKind::UserDeletion => None,
                DisagreementKind::ChurchDeletion => Some(Uuid::new_v4()),
            },
            document_type: DocumentKind::TermsOfService,
            disagreement_type: kind,
            status: DisagreementStatus::Pending,
            deadline_at,
            warning_sent_at: None,
            processed_at: None,
            created_at: Utc::now() - Duration::days(30),
        }
    }

    /// In-memory store double with injectable failures. Filter semantics
    /// mirror the Postgres implementation.
    #[derive(Default)]
    pub struct MockStore {
        pub rows: Mutex<Vec<LegalDisagreement>>,
        pub anonymized: Mutex<Vec<Uuid>>,
        pub identities_deleted: Mutex<Vec<Uuid>>,
        pub churches_deactivated: Mutex<Vec<Uuid>>,
        pub notifications: Mutex<Vec<(Uuid, String)>>,
        pub recipients_by_row: Mutex<HashMap<Uuid, Vec<Recipient>>>,
        pub fail_query: AtomicBool,
        pub fail_anonymize: AtomicBool,
        pub fail_delete_identity: AtomicBool,
        pub fail_deactivate_church: AtomicBool,
        pub fail_recipients: AtomicBool,
        /// When set, `expired_pending` skips the status filter, emulating a
        /// stale read that races a concurrent invocation.
        pub include_stale: AtomicBool,
    }

    impl MockStore {
        pub fn push(&self, row: LegalDisagreement) -> Uuid {
            let id = row.id;
            self.rows.lock().unwrap().push(row);
            id
        }

        pub fn row(&self, id: Uuid) -> LegalDisagreement {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .expect("row exists")
        }

        fn injected() -> StoreError {
            StoreError::Pool("injected failure".to_string())
        }
    }

    #[async_trait]
    impl LegalStore for MockStore {
        async fn expired_pending(
            &self,
            kind: DisagreementKind,
        ) -> Result<Vec<LegalDisagreement>, StoreError> {
            if self.fail_query.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            let now = Utc::now();
            let skip_status = self.include_stale.load(Ordering::SeqCst);
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| {
                    r.disagreement_type == kind
                        && r.deadline_at < now
                        && (skip_status || r.status == DisagreementStatus::Pending)
                })
                .cloned()
                .collect())
        }

        async fn claim_pending(&self, id: Uuid) -> Result<bool, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            match rows
                .iter_mut()
                .find(|r| r.id == id && r.status == DisagreementStatus::Pending)
            {
                Some(row) => {
                    row.status = DisagreementStatus::Processing;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn mark_completed(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
                row.status = DisagreementStatus::Completed;
                row.processed_at = Some(at);
            }
            Ok(())
        }

        async fn anonymize_profile(&self, profile_id: Uuid) -> Result<(), StoreError> {
            if self.fail_anonymize.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.anonymized.lock().unwrap().push(profile_id);
            Ok(())
        }

        async fn delete_identity(&self, user_id: Uuid) -> Result<(), StoreError> {
            if self.fail_delete_identity.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.identities_deleted.lock().unwrap().push(user_id);
            Ok(())
        }

        async fn deactivate_church(&self, church_id: Uuid) -> Result<(), StoreError> {
            if self.fail_deactivate_church.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.churches_deactivated.lock().unwrap().push(church_id);
            Ok(())
        }

        async fn warning_candidates(
            &self,
            kind: DisagreementKind,
            window: Duration,
        ) -> Result<Vec<LegalDisagreement>, StoreError> {
            if self.fail_query.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            let now = Utc::now();
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| {
                    r.disagreement_type == kind
                        && r.status == DisagreementStatus::Pending
                        && r.warning_sent_at.is_none()
                        && r.deadline_at > now
                        && r.deadline_at <= now + window
                })
                .cloned()
                .collect())
        }

        async fn mark_warning_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
                row.warning_sent_at = Some(at);
            }
            Ok(())
        }

        async fn recipients(
            &self,
            disagreement: &LegalDisagreement,
        ) -> Result<Vec<Recipient>, StoreError> {
            if self.fail_recipients.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            let map = self.recipients_by_row.lock().unwrap();
            Ok(map.get(&disagreement.id).cloned().unwrap_or_else(|| {
                vec![Recipient {
                    user_id: disagreement.user_id,
                    email: format!("{}@example.org", disagreement.user_id),
                    display_name: None,
                }]
            }))
        }

        async fn insert_notification(
            &self,
            user_id: Uuid,
            kind: &str,
            _title: &str,
            _body: &str,
        ) -> Result<(), StoreError> {
            self.notifications
                .lock()
                .unwrap()
                .push((user_id, kind.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockMailer {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail_for: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
            if self.fail_for.lock().unwrap().contains(to) {
                return Err(MailError::Transport("injected failure".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }
}
