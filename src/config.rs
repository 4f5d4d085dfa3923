// Server configuration

use crate::auth::{AuthConfig, AuthError, ProviderSettings};

/// Configuration for the memberhub server
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
}

impl Config {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut auth = AuthConfig {
            cookie: Default::default(),
            paths: Default::default(),
            provider: ProviderSettings {
                base_url: std::env::var("MEMBERHUB_PROVIDER_URL")
                    .unwrap_or_else(|_| "http://localhost:9999".to_string()),
                api_key: std::env::var("MEMBERHUB_PROVIDER_KEY").unwrap_or_default(),
            },
        };

        if let Ok(name) = std::env::var("MEMBERHUB_COOKIE_NAME") {
            auth.cookie.name = name;
        }
        auth.cookie.secure = std::env::var("MEMBERHUB_COOKIE_SECURE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            host: std::env::var("MEMBERHUB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("MEMBERHUB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(4000),
            auth,
        }
    }

    /// Config pointed at a specific identity provider, for tests.
    pub fn for_tests(provider_url: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            auth: AuthConfig {
                cookie: Default::default(),
                paths: Default::default(),
                provider: ProviderSettings {
                    base_url: provider_url.to_string(),
                    api_key: "test-key".to_string(),
                },
            },
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        self.auth.validate()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            auth: AuthConfig {
                cookie: Default::default(),
                paths: Default::default(),
                provider: ProviderSettings {
                    base_url: "http://localhost:9999".to_string(),
                    api_key: String::new(),
                },
            },
        }
    }
}
