use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name fields of an anonymized profile are replaced with this value.
pub const DELETED_MEMBER_PLACEHOLDER: &str = "Deleted Member";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    TermsOfService,
    PrivacyPolicy,
    Dpa,
    ChurchAdminTerms,
}

/// Normalized-key lookup table for document kinds. Keys are compared after
/// case-folding and stripping `-`, `_`, `.` and whitespace, so
/// `"Terms-Of-Service"` and `"terms_of_service"` resolve to the same kind.
/// Unknown keys resolve to `None`.
const DOCUMENT_KIND_REGISTRY: &[(&str, DocumentKind)] = &[
    ("termsofservice", DocumentKind::TermsOfService),
    ("privacypolicy", DocumentKind::PrivacyPolicy),
    ("dpa", DocumentKind::Dpa),
    ("dataprocessingagreement", DocumentKind::Dpa),
    ("churchadminterms", DocumentKind::ChurchAdminTerms),
];

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '-' | '_' | '.') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl DocumentKind {
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized = normalize_key(key);
        DOCUMENT_KIND_REGISTRY
            .iter()
            .find(|(k, _)| *k == normalized)
            .map(|(_, kind)| *kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TermsOfService => "terms_of_service",
            Self::PrivacyPolicy => "privacy_policy",
            Self::Dpa => "dpa",
            Self::ChurchAdminTerms => "church_admin_terms",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| format!("Unknown document type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisagreementKind {
    UserDeletion,
    ChurchDeletion,
}

impl DisagreementKind {
    /// Days between a document's effective date and the scheduled
    /// consequence, per business policy.
    pub fn grace_days(&self) -> i64 {
        match self {
            Self::UserDeletion => 14,
            Self::ChurchDeletion => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserDeletion => "user_deletion",
            Self::ChurchDeletion => "church_deletion",
        }
    }
}

impl std::fmt::Display for DisagreementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DisagreementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_deletion" => Ok(Self::UserDeletion),
            "church_deletion" => Ok(Self::ChurchDeletion),
            _ => Err(format!("Unknown disagreement type: {s}")),
        }
    }
}

/// Forward-only: pending -> processing -> completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisagreementStatus {
    Pending,
    Processing,
    Completed,
}

impl DisagreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for DisagreementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DisagreementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown disagreement status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalDisagreement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub church_id: Option<Uuid>,
    pub document_type: DocumentKind,
    pub disagreement_type: DisagreementKind,
    pub status: DisagreementStatus,
    pub deadline_at: DateTime<Utc>,
    pub warning_sent_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One warning-email recipient resolved for a disagreement.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    #[test]
    fn test_document_kind_registry_aliases() {
        test_util::setup();
        assert_eq!(
            DocumentKind::from_key("terms_of_service"),
            Some(DocumentKind::TermsOfService)
        );
        assert_eq!(
            DocumentKind::from_key("Terms-Of-Service"),
            Some(DocumentKind::TermsOfService)
        );
        assert_eq!(
            DocumentKind::from_key("Privacy Policy"),
            Some(DocumentKind::PrivacyPolicy)
        );
        assert_eq!(DocumentKind::from_key("DPA"), Some(DocumentKind::Dpa));
        assert_eq!(
            DocumentKind::from_key("data_processing_agreement"),
            Some(DocumentKind::Dpa)
        );
        assert_eq!(
            DocumentKind::from_key("church.admin.terms"),
            Some(DocumentKind::ChurchAdminTerms)
        );
    }

    #[test]
    fn test_document_kind_unknown_key_is_none() {
        test_util::setup();
        assert_eq!(DocumentKind::from_key("cookie_policy"), None);
        assert_eq!(DocumentKind::from_key(""), None);
    }

    #[test]
    fn test_document_kind_round_trip() {
        test_util::setup();
        for kind in [
            DocumentKind::TermsOfService,
            DocumentKind::PrivacyPolicy,
            DocumentKind::Dpa,
            DocumentKind::ChurchAdminTerms,
        ] {
            assert_eq!(kind.as_str().parse::<DocumentKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_grace_periods() {
        test_util::setup();
        assert_eq!(DisagreementKind::UserDeletion.grace_days(), 14);
        assert_eq!(DisagreementKind::ChurchDeletion.grace_days(), 30);
    }

    #[test]
    fn test_status_parse() {
        test_util::setup();
        assert_eq!("pending".parse(), Ok(DisagreementStatus::Pending));
        assert_eq!("processing".parse(), Ok(DisagreementStatus::Processing));
        assert_eq!("completed".parse(), Ok(DisagreementStatus::Completed));
        assert!("cancelled".parse::<DisagreementStatus>().is_err());
    }
}
