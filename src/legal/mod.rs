use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::models::{DisagreementKind, DisagreementStatus, DocumentKind};
use crate::shared::schema::{legal_acceptances, legal_disagreements, legal_documents};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = legal_documents)]
pub struct DbLegalDocument {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub document_type: String,
    pub version: String,
    pub effective_date: DateTime<Utc>,
    pub is_active: bool,
    pub requires_acceptance: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = legal_acceptances)]
pub struct DbLegalAcceptance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub document_version: String,
    pub accepted_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = legal_disagreements)]
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalDocument {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub document_type: DocumentKind,
    pub version: String,
    pub effective_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub requires_acceptance: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub document_type: Option<String>,
    pub active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RecordAcceptanceRequest {
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptanceResponse {
    pub id: Uuid,
    pub accepted_at: DateTime<Utc>,
    /// Pending disagreements for the same document type removed by this
    /// acceptance.
    pub withdrawn_disagreements: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecordDisagreementRequest {
    pub user_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub church_id: Option<Uuid>,
    pub document_id: Uuid,
    pub disagreement_type: DisagreementKind,
}

#[derive(Debug, Serialize)]
pub struct DisagreementResponse {
    pub id: Uuid,
    pub document_type: DocumentKind,
    pub disagreement_type: DisagreementKind,
    pub status: DisagreementStatus,
    pub deadline_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum LegalError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for LegalError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(msg) | Self::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn db_document_to_document(db: DbLegalDocument) -> LegalDocument {
    let document_type = db
        .document_type
        .parse()
        .unwrap_or(DocumentKind::TermsOfService);

    LegalDocument {
        id: db.id,
        slug: db.slug,
        title: db.title,
        content: db.content,
        document_type,
        version: db.version,
        effective_date: db.effective_date,
        last_updated: db.updated_at,
        requires_acceptance: db.requires_acceptance,
    }
}

/// Deadline policy: the consequence becomes eligible a fixed grace period
/// after the document took effect, not after the disagreement was recorded.
pub(crate) fn deadline_for(kind: DisagreementKind, effective_date: DateTime<Utc>) -> DateTime<Utc> {
    effective_date + Duration::days(kind.grace_days())
}

pub async fn handle_list_documents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<Vec<LegalDocument>>, LegalError> {
    let pool = state.conn.clone();

    let kind_filter = match query.document_type.as_deref() {
        Some(raw) => Some(
            DocumentKind::from_key(raw)
                .ok_or_else(|| LegalError::Validation(format!("Unknown document type: {raw}")))?,
        ),
        None => None,
    };

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| LegalError::Database(e.to_string()))?;

        let mut db_query = legal_documents::table.into_boxed();

        if let Some(kind) = kind_filter {
            db_query = db_query.filter(legal_documents::document_type.eq(kind.as_str()));
        }

        if query.active_only.unwrap_or(true) {
            db_query = db_query.filter(legal_documents::is_active.eq(true));
        }

        let db_docs: Vec<DbLegalDocument> = db_query
            .order(legal_documents::effective_date.desc())
            .load(&mut conn)
            .map_err(|e| LegalError::Database(e.to_string()))?;

        let docs: Vec<LegalDocument> = db_docs.into_iter().map(db_document_to_document).collect();
        Ok::<_, LegalError>(docs)
    })
    .await
    .map_err(|e| LegalError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_get_document(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Option<LegalDocument>>, LegalError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| LegalError::Database(e.to_string()))?;

        let db_doc: Option<DbLegalDocument> = legal_documents::table
            .filter(legal_documents::slug.eq(&slug))
            .filter(legal_documents::is_active.eq(true))
            .first(&mut conn)
            .optional()
            .map_err(|e| LegalError::Database(e.to_string()))?;

        Ok::<_, LegalError>(db_doc.map(db_document_to_document))
    })
    .await
    .map_err(|e| LegalError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_record_acceptance(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordAcceptanceRequest>,
) -> Result<Json<AcceptanceResponse>, LegalError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| LegalError::Database(e.to_string()))?;
        let now = Utc::now();

        let document: DbLegalDocument = legal_documents::table
            .find(req.document_id)
            .first(&mut conn)
            .map_err(|_| LegalError::NotFound("Document not found".to_string()))?;

        let acceptance = DbLegalAcceptance {
            id: Uuid::new_v4(),
            user_id: req.user_id,
            document_id: document.id,
            document_version: document.version.clone(),
            accepted_at: now,
            ip_address: req.ip_address,
            user_agent: req.user_agent,
        };

        diesel::insert_into(legal_acceptances::table)
            .values(&acceptance)
            .execute(&mut conn)
            .map_err(|e| LegalError::Database(e.to_string()))?;

        // Accepting the current document withdraws any pending disagreement
        // about the same document type. Rows already in processing or
        // completed stay untouched.
        let withdrawn = diesel::delete(
            legal_disagreements::table
                .filter(legal_disagreements::user_id.eq(req.user_id))
                .filter(legal_disagreements::document_type.eq(&document.document_type))
                .filter(legal_disagreements::status.eq(DisagreementStatus::Pending.as_str())),
        )
        .execute(&mut conn)
        .map_err(|e| LegalError::Database(e.to_string()))?;

        Ok::<_, LegalError>(AcceptanceResponse {
            id: acceptance.id,
            accepted_at: acceptance.accepted_at,
            withdrawn_disagreements: withdrawn,
        })
    })
    .await
    .map_err(|e| LegalError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_record_disagreement(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordDisagreementRequest>,
) -> Result<Json<DisagreementResponse>, LegalError> {
    if req.disagreement_type == DisagreementKind::ChurchDeletion && req.church_id.is_none() {
        return Err(LegalError::Validation(
            "church_id is required for church deletions".to_string(),
        ));
    }

    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| LegalError::Database(e.to_string()))?;
        let now = Utc::now();

        let document: DbLegalDocument = legal_documents::table
            .find(req.document_id)
            .first(&mut conn)
            .map_err(|_| LegalError::NotFound("Document not found".to_string()))?;

        let document_type: DocumentKind = document
            .document_type
            .parse()
            .map_err(|e: String| LegalError::Internal(e))?;

        let existing: i64 = legal_disagreements::table
            .filter(legal_disagreements::user_id.eq(req.user_id))
            .filter(legal_disagreements::document_type.eq(document_type.as_str()))
            .filter(legal_disagreements::status.eq(DisagreementStatus::Pending.as_str()))
            .count()
            .get_result(&mut conn)
            .map_err(|e| LegalError::Database(e.to_string()))?;
        if existing > 0 {
            return Err(LegalError::Validation(
                "A pending disagreement already exists for this document".to_string(),
            ));
        }

        let disagreement = DbLegalDisagreement {
            id: Uuid::new_v4(),
            user_id: req.user_id,
            profile_id: req.profile_id,
            church_id: req.church_id,
            document_type: document_type.as_str().to_string(),
            disagreement_type: req.disagreement_type.as_str().to_string(),
            status: DisagreementStatus::Pending.as_str().to_string(),
            deadline_at: deadline_for(req.disagreement_type, document.effective_date),
            warning_sent_at: None,
            processed_at: None,
            created_at: now,
        };

        diesel::insert_into(legal_disagreements::table)
            .values(&disagreement)
            .execute(&mut conn)
            .map_err(|e| LegalError::Database(e.to_string()))?;

        Ok::<_, LegalError>(DisagreementResponse {
            id: disagreement.id,
            document_type,
            disagreement_type: req.disagreement_type,
            status: DisagreementStatus::Pending,
            deadline_at: disagreement.deadline_at,
        })
    })
    .await
    .map_err(|e| LegalError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub async fn handle_withdraw_disagreement(
    State(state): State<Arc<AppState>>,
    Path(disagreement_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, LegalError> {
    let pool = state.conn.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| LegalError::Database(e.to_string()))?;

        let removed = diesel::delete(
            legal_disagreements::table
                .filter(legal_disagreements::id.eq(disagreement_id))
                .filter(legal_disagreements::status.eq(DisagreementStatus::Pending.as_str())),
        )
        .execute(&mut conn)
        .map_err(|e| LegalError::Database(e.to_string()))?;

        if removed == 0 {
            return Err(LegalError::NotFound(
                "Disagreement not found or already processed".to_string(),
            ));
        }

        Ok::<_, LegalError>(serde_json::json!({ "withdrawn": true }))
    })
    .await
    .map_err(|e| LegalError::Internal(e.to_string()))??;

    Ok(Json(result))
}

pub fn configure_legal_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/legal/documents", get(handle_list_documents))
        .route("/api/legal/documents/:slug", get(handle_get_document))
        .route("/api/legal/acceptances", post(handle_record_acceptance))
        .route("/api/legal/disagreements", post(handle_record_disagreement))
        .route(
            "/api/legal/disagreements/:disagreement_id",
            delete(handle_withdraw_disagreement),
        )
}
