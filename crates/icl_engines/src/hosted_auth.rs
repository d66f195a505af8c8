#![forbid(unsafe_code)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

use icl_contracts::identity::{AuthState, Identity};

/// Cookie carrying the hosted provider's access token.
pub const ACCESS_TOKEN_COOKIE: &str = "__pa_at";

/// Identity check could not complete. Not a rejection: the adapter logs it and
/// treats the caller as unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedAuthError {
    pub kind: &'static str,
    pub status: Option<u16>,
}

impl HostedAuthError {
    fn new(kind: &'static str, status: Option<u16>) -> Self {
        Self { kind, status }
    }
}

impl std::fmt::Display for HostedAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "hosted identity check failed: {} ({status})", self.kind),
            None => write!(f, "hosted identity check failed: {}", self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedAuthConfig {
    pub auth_url: String,
    pub api_key: String,
    pub timeout_ms: u32,
}

#[derive(Serialize)]
struct ValidateTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct HostedUserInfo {
    username: String,
    #[serde(default)]
    name: Option<String>,
}

/// Extract the provider access token from an inbound `Cookie` header.
pub fn access_token_from_cookie_header(header: &str) -> Option<String> {
    for cookie in header.split(';') {
        if let Some((key, value)) = cookie.split_once('=') {
            if key.trim() == ACCESS_TOKEN_COOKIE && !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Hosted-token session guard: forwards the bearer token to the identity
/// service. Only a service-reported "unauthorized" maps to unauthenticated;
/// everything else is an availability error for the caller to log.
pub struct HostedAuthRuntime {
    config: HostedAuthConfig,
    agent: ureq::Agent,
}

impl HostedAuthRuntime {
    pub fn new(config: HostedAuthConfig) -> Result<Self, String> {
        if !config.auth_url.starts_with("http://") && !config.auth_url.starts_with("https://") {
            return Err("auth_url must be an http(s) url".to_string());
        }
        if config.api_key.trim().is_empty() {
            return Err("api_key must not be empty".to_string());
        }
        if config.timeout_ms == 0 {
            return Err("timeout must be > 0".to_string());
        }
        let timeout = Duration::from_millis(u64::from(config.timeout_ms).max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Ok(Self { config, agent })
    }

    pub fn authenticate(&self, cookie_header: Option<&str>) -> Result<AuthState, HostedAuthError> {
        let Some(token) = cookie_header.and_then(access_token_from_cookie_header) else {
            return Ok(AuthState::Unauthenticated);
        };
        let endpoint = format!(
            "{}/api/backend/v1/validate",
            self.config.auth_url.trim_end_matches('/')
        );
        let response = self
            .agent
            .post(&endpoint)
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .set("Accept", "application/json")
            .send_json(ValidateTokenRequest {
                access_token: &token,
            });
        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(401 | 403, _)) => return Ok(AuthState::Unauthenticated),
            Err(ureq::Error::Status(status, _)) => {
                return Err(HostedAuthError::new("http_non_200", Some(status)))
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(transport_error(&format!(
                    "{:?} {}",
                    transport.kind(),
                    transport
                )))
            }
        };
        let info: HostedUserInfo = serde_json::from_reader(response.into_reader())
            .map_err(|_| HostedAuthError::new("json_parse", None))?;
        let display_name = info.name.unwrap_or_else(|| info.username.clone());
        match Identity::v1(display_name, info.username) {
            Ok(identity) => Ok(AuthState::Authenticated(identity)),
            Err(_) => Err(HostedAuthError::new("invalid_identity", None)),
        }
    }
}

fn transport_error(raw: &str) -> HostedAuthError {
    let lower = raw.to_ascii_lowercase();
    let kind = if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    };
    HostedAuthError::new(kind, None)
}
