use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use log::warn;
use uuid::Uuid;

use crate::shared::models::{
    DisagreementKind, DisagreementStatus, LegalDisagreement, Recipient,
    DELETED_MEMBER_PLACEHOLDER,
};
use crate::shared::schema::{
    church_members, churches, legal_disagreements, notifications, profiles, users,
};
use crate::shared::utils::DbPool;
use crate::store::{LegalStore, StoreError};

#[derive(Debug, Clone, Queryable)]
pub struct DbLegalDisagreement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub church_id: Option<Uuid>,
    pub document_type: String,
    pub disagreement_type: String,
    pub status: String,
    pub deadline_at: DateTime<Utc>,
    pub warning_sent_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn db_to_domain(db: DbLegalDisagreement) -> Option<LegalDisagreement> {
    let document_type = match db.document_type.parse() {
        Ok(v) => v,
        Err(e) => {
            warn!("skipping disagreement {}: {e}", db.id);
            return None;
        }
    };
    let disagreement_type = match db.disagreement_type.parse() {
        Ok(v) => v,
        Err(e) => {
            warn!("skipping disagreement {}: {e}", db.id);
            return None;
        }
    };
    let status = match db.status.parse() {
        Ok(v) => v,
        Err(e) => {
            warn!("skipping disagreement {}: {e}", db.id);
            return None;
        }
    };

    Some(LegalDisagreement {
        id: db.id,
        user_id: db.user_id,
        profile_id: db.profile_id,
        church_id: db.church_id,
        document_type,
        disagreement_type,
        status,
        deadline_at: db.deadline_at,
        warning_sent_at: db.warning_sent_at,
        processed_at: db.processed_at,
        created_at: db.created_at,
    })
}

pub struct PgLegalStore {
    pool: DbPool,
}

impl PgLegalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LegalStore for PgLegalStore {
    async fn expired_pending(
        &self,
        kind: DisagreementKind,
    ) -> Result<Vec<LegalDisagreement>, StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            let rows: Vec<DbLegalDisagreement> = legal_disagreements::table
                .filter(legal_disagreements::status.eq(DisagreementStatus::Pending.as_str()))
                .filter(legal_disagreements::disagreement_type.eq(kind.as_str()))
                .filter(legal_disagreements::deadline_at.lt(Utc::now()))
                .order(legal_disagreements::deadline_at.asc())
                .load(&mut conn)?;
            Ok(rows.into_iter().filter_map(db_to_domain).collect())
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn claim_pending(&self, id: Uuid) -> Result<bool, StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            // Single conditional update: the affected-row count is the claim.
            let affected = diesel::update(
                legal_disagreements::table
                    .filter(legal_disagreements::id.eq(id))
                    .filter(legal_disagreements::status.eq(DisagreementStatus::Pending.as_str())),
            )
            .set(legal_disagreements::status.eq(DisagreementStatus::Processing.as_str()))
            .execute(&mut conn)?;
            Ok(affected > 0)
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn mark_completed(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            diesel::update(legal_disagreements::table.find(id))
                .set((
                    legal_disagreements::status.eq(DisagreementStatus::Completed.as_str()),
                    legal_disagreements::processed_at.eq(Some(at)),
                ))
                .execute(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn anonymize_profile(&self, profile_id: Uuid) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            diesel::update(profiles::table.find(profile_id))
                .set((
                    profiles::display_name.eq(DELETED_MEMBER_PLACEHOLDER),
                    profiles::first_name.eq(None::<String>),
                    profiles::last_name.eq(None::<String>),
                    profiles::email.eq(None::<String>),
                    profiles::phone.eq(None::<String>),
                    profiles::avatar_url.eq(None::<String>),
                    profiles::address.eq(None::<String>),
                    profiles::updated_at.eq(Utc::now()),
                ))
                .execute(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn delete_identity(&self, user_id: Uuid) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            diesel::delete(users::table.find(user_id)).execute(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn deactivate_church(&self, church_id: Uuid) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            let now = Utc::now();
            diesel::update(churches::table.find(church_id))
                .set((
                    churches::is_active.eq(false),
                    churches::deleted_at.eq(Some(now)),
                    churches::updated_at.eq(now),
                ))
                .execute(&mut conn)?;
            diesel::delete(
                church_members::table.filter(church_members::church_id.eq(church_id)),
            )
            .execute(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn warning_candidates(
        &self,
        kind: DisagreementKind,
        window: Duration,
    ) -> Result<Vec<LegalDisagreement>, StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            let now = Utc::now();
            let rows: Vec<DbLegalDisagreement> = legal_disagreements::table
                .filter(legal_disagreements::status.eq(DisagreementStatus::Pending.as_str()))
                .filter(legal_disagreements::disagreement_type.eq(kind.as_str()))
                .filter(legal_disagreements::warning_sent_at.is_null())
                .filter(legal_disagreements::deadline_at.gt(now))
                .filter(legal_disagreements::deadline_at.le(now + window))
                .order(legal_disagreements::deadline_at.asc())
                .load(&mut conn)?;
            Ok(rows.into_iter().filter_map(db_to_domain).collect())
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn mark_warning_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            diesel::update(legal_disagreements::table.find(id))
                .set(legal_disagreements::warning_sent_at.eq(Some(at)))
                .execute(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn recipients(
        &self,
        disagreement: &LegalDisagreement,
    ) -> Result<Vec<Recipient>, StoreError> {
        let pool = self.pool.clone();
        let disagreement = disagreement.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            match disagreement.disagreement_type {
                DisagreementKind::UserDeletion => {
                    let email: String = users::table
                        .find(disagreement.user_id)
                        .select(users::email)
                        .first(&mut conn)?;
                    let display_name: Option<String> = match disagreement.profile_id {
                        Some(profile_id) => profiles::table
                            .find(profile_id)
                            .select(profiles::display_name)
                            .first(&mut conn)
                            .optional()?,
                        None => None,
                    };
                    Ok(vec![Recipient {
                        user_id: disagreement.user_id,
                        email,
                        display_name,
                    }])
                }
                DisagreementKind::ChurchDeletion => {
                    let church_id = disagreement.church_id.ok_or_else(|| {
                        StoreError::Inconsistent(format!(
                            "church disagreement {} has no church_id",
                            disagreement.id
                        ))
                    })?;
                    let rows: Vec<(Uuid, String, Option<String>)> = church_members::table
                        .inner_join(users::table.on(users::id.eq(church_members::user_id)))
                        .left_join(
                            profiles::table.on(profiles::user_id.eq(church_members::user_id)),
                        )
                        .filter(church_members::church_id.eq(church_id))
                        .select((
                            users::id,
                            users::email,
                            profiles::display_name.nullable(),
                        ))
                        .load(&mut conn)?;
                    Ok(rows
                        .into_iter()
                        .map(|(user_id, email, display_name)| Recipient {
                            user_id,
                            email,
                            display_name,
                        })
                        .collect())
                }
            }
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn insert_notification(
        &self,
        user_id: Uuid,
        kind: &str,
        title: &str,
        body: &str,
    ) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let kind = kind.to_string();
        let title = title.to_string();
        let body = body.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            diesel::insert_into(notifications::table)
                .values((
                    notifications::id.eq(Uuid::new_v4()),
                    notifications::user_id.eq(user_id),
                    notifications::kind.eq(kind),
                    notifications::title.eq(title),
                    notifications::body.eq(body),
                    notifications::created_at.eq(Utc::now()),
                ))
                .execute(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }
}
