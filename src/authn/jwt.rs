use anyhow::{bail, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::{TokenVerifier, VerifiedSubject};

/// Claims carried by the content system's session tokens. Only the subject
/// identity matters here; `exp` is validated by the decoder.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    pub id: Option<i64>,     // Numeric user id (the usual case)
    pub sub: Option<String>, // Fallback string subject
    pub exp: usize,          // Required. Token expiration time (timestamp)
}

/// JSON Web Token verifier for the upstream content system's session tokens.
/// Tokens are signed with a shared HS256 secret; the gateway only verifies,
/// it never issues tokens.
pub struct JwtTokenVerifier {
    key: DecodingKey,
    subject_prefix: String,
}

impl JwtTokenVerifier {
    /// Creates a new verifier.
    ///
    /// # Arguments
    /// * `secret` - HS256 secret shared with the token issuer
    /// * `subject_prefix` - Prefix applied to the raw id to form the stable
    ///   subject key, e.g. "user-"
    pub fn new(secret: &str, subject_prefix: String) -> Result<Self> {
        if secret.is_empty() {
            bail!("jwt secret is required");
        }
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            subject_prefix,
        })
    }
}

impl TokenVerifier for JwtTokenVerifier {
    fn verify(&self, token: &str) -> Result<VerifiedSubject> {
        let validation = Validation::new(Algorithm::HS256);

        let claims = match decode::<Claims>(token, &self.key, &validation) {
            Ok(data) => data.claims,
            Err(e) => bail!("validate jwt token failed: {e}"),
        };

        let record_id = match (claims.id, claims.sub) {
            (Some(id), _) => id.to_string(),
            (None, Some(sub)) if !sub.is_empty() => sub,
            _ => bail!("validate jwt token failed: no subject claim"),
        };

        Ok(VerifiedSubject {
            key: format!("{}{}", self.subject_prefix, record_id),
            record_id,
        })
    }
}
