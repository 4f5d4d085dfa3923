// Identity Provider Client
// The network half of the verification protocol. `revalidate` is the only
// source of truth for identity; everything else is account plumbing the
// pages consume. Provider-side storage and token issuance are external.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::session::{Session, User};

const TOKEN_PATH: &str = "/token";
const SIGNUP_PATH: &str = "/signup";
const USER_PATH: &str = "/user";
const VERIFY_PATH: &str = "/verify";
const LOGOUT_PATH: &str = "/logout";

/// One-time token kinds accepted by the confirm endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpType {
    Signup,
    Email,
    Recovery,
}

impl OtpType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "signup" => Some(OtpType::Signup),
            "email" => Some(OtpType::Email),
            "recovery" => Some(OtpType::Recovery),
            _ => None,
        }
    }
}

/// Network operations this application consumes from the identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Re-derive the user from the provider's source of truth. This is the
    /// round-trip that turns a decodable claim into a trusted identity.
    async fn revalidate(&self, access_token: &str) -> Result<User, AuthError>;

    /// Password sign-in; returns a freshly issued session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Account creation. Confirmation happens out of band; no session is
    /// issued here.
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError>;

    /// Exchange a one-time token for a session.
    async fn verify_otp(
        &self,
        otp_type: OtpType,
        token_hash: &str,
    ) -> Result<Session, AuthError>;

    /// Invalidate the session at the provider.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

/// Raw token response from the provider.
#[derive(Debug, Deserialize)]
struct TokenResponseRaw {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
}

impl TokenResponseRaw {
    fn into_session(self) -> Result<Session, AuthError> {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|ttl| Utc::now().timestamp() + ttl))
            .ok_or_else(|| AuthError::ProviderError("token response without expiry".to_string()))?;

        Session::from_tokens(self.access_token, self.refresh_token, expires_at)
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyOtpRequest<'a> {
    #[serde(rename = "type")]
    otp_type: OtpType,
    token_hash: &'a str,
}

/// HTTP client for the identity provider.
pub struct HttpIdentityProvider {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl HttpIdentityProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AuthError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        url::Url::parse(&base_url).map_err(|e| AuthError::InvalidConfig {
            key: "provider.base_url".to_string(),
            reason: e.to_string(),
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn error_from_response(response: reqwest::Response) -> AuthError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            AuthError::InvalidCredentials
        } else {
            AuthError::ProviderError(format!("status {}: {}", status, text))
        }
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityProvider {
    async fn revalidate(&self, access_token: &str) -> Result<User, AuthError> {
        let response = self
            .http_client
            .get(self.endpoint(USER_PATH))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let user: User = response.json().await.map_err(AuthError::from)?;
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .http_client
            .post(self.endpoint(TOKEN_PATH))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let raw: TokenResponseRaw = response.json().await.map_err(AuthError::from)?;
        raw.into_session()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let response = self
            .http_client
            .post(self.endpoint(SIGNUP_PATH))
            .header("apikey", &self.api_key)
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    async fn verify_otp(
        &self,
        otp_type: OtpType,
        token_hash: &str,
    ) -> Result<Session, AuthError> {
        let response = self
            .http_client
            .post(self.endpoint(VERIFY_PATH))
            .header("apikey", &self.api_key)
            .json(&VerifyOtpRequest {
                otp_type,
                token_hash,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::OtpVerificationFailed(format!(
                "status {}: {}",
                status, text
            )));
        }

        let raw: TokenResponseRaw = response.json().await.map_err(AuthError::from)?;
        raw.into_session()
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http_client
            .post(self.endpoint(LOGOUT_PATH))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }
}
