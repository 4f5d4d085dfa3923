// Authentication Configuration
// Cookie attributes, guard paths, and identity provider settings

use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Main authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session cookie configuration
    #[serde(default)]
    pub cookie: CookieConfig,

    /// Route guard paths
    #[serde(default)]
    pub paths: GuardPaths,

    /// Identity provider settings
    pub provider: ProviderSettings,
}

impl AuthConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AuthError> {
        self.cookie.validate()?;
        self.paths.validate()?;
        self.provider.validate()?;
        Ok(())
    }
}

/// Cookie configuration for the session credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Cookie name
    #[serde(default = "default_cookie_name")]
    pub name: String,

    /// Secure flag (HTTPS only) - should be true in production
    #[serde(default = "default_false")]
    pub secure: bool,

    /// HttpOnly flag (prevent JavaScript access)
    #[serde(default = "default_true")]
    pub http_only: bool,

    /// SameSite policy
    #[serde(default = "default_same_site")]
    pub same_site: SameSitePolicy,

    /// Session cookie lifetime in seconds
    #[serde(default = "default_cookie_max_age")]
    pub max_age: u64,
}

impl CookieConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if self.name.is_empty() {
            return Err(AuthError::InvalidConfig {
                key: "cookie.name".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }

        if self.name.contains([';', '=', ' ']) {
            return Err(AuthError::InvalidConfig {
                key: "cookie.name".to_string(),
                reason: "must not contain ';', '=' or spaces".to_string(),
            });
        }

        if self.max_age < 60 {
            return Err(AuthError::InvalidConfig {
                key: "cookie.max_age".to_string(),
                reason: "must be at least 60 seconds".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            secure: false, // Development default
            http_only: true,
            same_site: default_same_site(),
            max_age: default_cookie_max_age(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl SameSitePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSitePolicy::Strict => "Strict",
            SameSitePolicy::Lax => "Lax",
            SameSitePolicy::None => "None",
        }
    }
}

/// Paths consumed by the route guard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardPaths {
    /// Prefix under which every route requires a session
    #[serde(default = "default_protected_prefix")]
    pub protected_prefix: String,

    /// The login page; authenticated visits bounce to the landing page
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Where authenticated visitors of the login page are sent
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

impl GuardPaths {
    fn validate(&self) -> Result<(), AuthError> {
        for (key, value) in [
            ("paths.protected_prefix", &self.protected_prefix),
            ("paths.login_path", &self.login_path),
            ("paths.landing_path", &self.landing_path),
        ] {
            if !value.starts_with('/') {
                return Err(AuthError::InvalidConfig {
                    key: key.to_string(),
                    reason: "must start with '/'".to_string(),
                });
            }
        }

        if self.landing_path == self.login_path {
            return Err(AuthError::InvalidConfig {
                key: "paths.landing_path".to_string(),
                reason: "must differ from the login path".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for GuardPaths {
    fn default() -> Self {
        Self {
            protected_prefix: default_protected_prefix(),
            login_path: default_login_path(),
            landing_path: default_landing_path(),
        }
    }
}

/// Identity provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL of the identity provider
    pub base_url: String,

    /// Public API key sent with every provider request
    #[serde(default)]
    pub api_key: String,
}

impl ProviderSettings {
    fn validate(&self) -> Result<(), AuthError> {
        if self.base_url.is_empty() {
            return Err(AuthError::MissingConfig(
                "provider.base_url".to_string(),
            ));
        }

        if url::Url::parse(&self.base_url).is_err() {
            return Err(AuthError::InvalidConfig {
                key: "provider.base_url".to_string(),
                reason: "not a URL".to_string(),
            });
        }

        Ok(())
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_same_site() -> SameSitePolicy {
    SameSitePolicy::Lax
}

fn default_cookie_name() -> String {
    "mh-session".to_string()
}

fn default_cookie_max_age() -> u64 {
    3600 * 24 * 7 // 7 days
}

fn default_protected_prefix() -> String {
    "/private".to_string()
}

fn default_login_path() -> String {
    "/auth".to_string()
}

fn default_landing_path() -> String {
    "/private".to_string()
}
