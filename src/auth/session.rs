// Session and Identity Types
// The locally-decodable session claim and the provider-verified identity

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// JSON payload stored in the session cookie, URL-safe base64 encoded.
/// This is raw bearer material: possession of the cookie is the only thing
/// it proves. Nothing here is trusted until the provider revalidates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Claims decoded from the access token without signature verification.
/// A decoded claim proves that a login occurred at some point, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Subject (user id at the provider)
    pub sub: String,

    /// Expiration time (unix seconds)
    pub exp: i64,

    /// Email address, when the provider includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The locally-decoded half of an identity. Carries the bearer tokens and
/// the unverified claims; pairs with a `User` only after revalidation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub claims: SessionClaims,
}

impl Session {
    /// Decode a session from the raw cookie value.
    ///
    /// This is the fast-path existence check: URL-safe base64, then JSON,
    /// then a claim decode with signature verification disabled. Expired
    /// tokens still decode here; the provider is the one who rejects them.
    pub fn from_cookie_value(value: &str) -> Result<Self, AuthError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(value.as_bytes())
            .map_err(|_| AuthError::InvalidSessionCookie)?;

        let record: SessionRecord =
            serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidSessionCookie)?;

        let claims = decode_claims_unverified(&record.access_token)?;

        Ok(Self {
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            expires_at: record.expires_at,
            claims,
        })
    }

    /// Encode a session into the cookie value format.
    pub fn to_cookie_value(&self) -> Result<String, AuthError> {
        let record = SessionRecord {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        };
        let json = serde_json::to_vec(&record)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Build a session from freshly issued provider tokens.
    pub fn from_tokens(
        access_token: String,
        refresh_token: String,
        expires_at: i64,
    ) -> Result<Self, AuthError> {
        let claims = decode_claims_unverified(&access_token)?;
        Ok(Self {
            access_token,
            refresh_token,
            expires_at,
            claims,
        })
    }
}

/// Decode claims without verifying the signature. The decoded result must
/// never feed an authorization decision; only provider revalidation proves
/// identity.
fn decode_claims_unverified(token: &str) -> Result<SessionClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.set_required_spec_claims(&["sub", "exp"]);
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<SessionClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    Ok(data.claims)
}

/// User as returned by the identity provider's source of truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: uuid::Uuid,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// The pair produced by the Identity Verifier.
///
/// Invariant: `user.is_some()` implies `session.is_some()` and implies the
/// revalidation round-trip succeeded within the current request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifiedIdentity {
    pub session: Option<Session>,
    pub user: Option<User>,
}

impl VerifiedIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}
