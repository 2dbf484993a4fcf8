use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CronAuthError {
    /// Server-side secret is not configured. Fails closed; never treated as
    /// a plain authorization failure so operators see a 500, not a 401.
    #[error("cron secret is not configured")]
    MissingSecret,
    #[error("unauthorized")]
    Unauthorized,
}

/// Validates the `Authorization` header of scheduler requests against the
/// configured secret. Pure check; logging is the caller's responsibility.
pub struct CronSecretVerifier {
    secret: Option<String>,
}

impl CronSecretVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    pub fn verify(&self, auth_header: Option<&str>) -> Result<(), CronAuthError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(CronAuthError::MissingSecret)?;
        let provided = auth_header.ok_or(CronAuthError::Unauthorized)?.as_bytes();
        let expected = format!("Bearer {secret}");
        let expected = expected.as_bytes();

        if expected.len() != provided.len() {
            // Burn a comparison against a zero buffer of the caller's length
            // so the time taken does not reveal whether the length matched.
            let zeros = vec![0u8; provided.len()];
            let _ = provided.ct_eq(&zeros);
            return Err(CronAuthError::Unauthorized);
        }

        if bool::from(expected.ct_eq(provided)) {
            Ok(())
        } else {
            Err(CronAuthError::Unauthorized)
        }
    }
}
