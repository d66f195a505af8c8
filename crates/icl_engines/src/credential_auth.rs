#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use icl_contracts::identity::{AuthState, Identity};

const CREDENTIALS_SCHEMA_VERSION: u8 = 1;
const MIN_COOKIE_KEY_CHARS: usize = 32;
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Invalid(reason) => write!(f, "invalid credentials config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialUser {
    pub name: String,
    pub password_sha256_hex: String,
    pub salt_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub key: String,
    pub expiry_days: u16,
}

/// Strongly-typed credentials file. Loading validates everything up front so a
/// bad file fails with a descriptive error instead of limping along half-null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub schema_version: u8,
    pub cookie: CookieConfig,
    pub users: BTreeMap<String, CredentialUser>,
    #[serde(default)]
    pub preauthorized: Vec<String>,
}

impl CredentialConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.check()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.check()?;
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.schema_version != CREDENTIALS_SCHEMA_VERSION {
            return Err(ConfigError::Invalid("unsupported schema_version"));
        }
        if self.cookie.name.trim().is_empty() {
            return Err(ConfigError::Invalid("cookie.name must not be empty"));
        }
        if self.cookie.key.len() < MIN_COOKIE_KEY_CHARS {
            return Err(ConfigError::Invalid("cookie.key must be >= 32 chars"));
        }
        if self.cookie.expiry_days == 0 || self.cookie.expiry_days > 365 {
            return Err(ConfigError::Invalid("cookie.expiry_days must be 1..=365"));
        }
        for (username, user) in &self.users {
            if username.trim().is_empty() {
                return Err(ConfigError::Invalid("username must not be empty"));
            }
            if user.name.trim().is_empty() {
                return Err(ConfigError::Invalid("user display name must not be empty"));
            }
            if user.password_sha256_hex.len() != 64 || !is_ascii_hex(&user.password_sha256_hex) {
                return Err(ConfigError::Invalid(
                    "password_sha256_hex must be 64 hex chars",
                ));
            }
            if user.salt_hex.is_empty() || !is_ascii_hex(&user.salt_hex) {
                return Err(ConfigError::Invalid("salt_hex must be non-empty hex"));
            }
        }
        Ok(())
    }
}

fn is_ascii_hex(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Salted password hash as stored in the credentials file.
pub fn hash_password(salt_hex: &str, password: &str) -> String {
    sha256_hex(&[salt_hex.as_bytes(), password.as_bytes()])
}

pub fn random_hex(bytes: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    let mut out = String::with_capacity(bytes * 2);
    for byte in buf {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CookiePayload {
    schema_version: u8,
    username: String,
    name: String,
    expires_unix: u64,
}

/// Signed session cookie issued on a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCookie {
    pub name: String,
    pub value: String,
    pub expires_unix: u64,
}

/// Credential-file session guard. Validates submitted username/password against
/// the loaded config and issues/verifies signed cookies. Never panics on bad
/// input: every failure maps to `Rejected` or `Unauthenticated`.
#[derive(Debug, Clone)]
pub struct CredentialAuthRuntime {
    config: CredentialConfig,
}

impl CredentialAuthRuntime {
    pub fn new(config: CredentialConfig) -> Result<Self, ConfigError> {
        config.check()?;
        Ok(Self { config })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::new(CredentialConfig::load(path)?)
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie.name
    }

    pub fn login(
        &self,
        username: &str,
        password: &str,
        now_unix: u64,
    ) -> (AuthState, Option<IssuedCookie>) {
        let Some(user) = self.config.users.get(username) else {
            return (AuthState::Rejected, None);
        };
        if hash_password(&user.salt_hex, password) != user.password_sha256_hex {
            return (AuthState::Rejected, None);
        }
        let Ok(identity) = Identity::v1(user.name.clone(), username) else {
            return (AuthState::Rejected, None);
        };
        let expires_unix =
            now_unix + u64::from(self.config.cookie.expiry_days) * SECONDS_PER_DAY;
        let payload = CookiePayload {
            schema_version: CREDENTIALS_SCHEMA_VERSION,
            username: username.to_string(),
            name: user.name.clone(),
            expires_unix,
        };
        let Ok(payload_json) = serde_json::to_string(&payload) else {
            return (AuthState::Rejected, None);
        };
        let value = format!(
            "{}.{}",
            BASE64.encode(payload_json.as_bytes()),
            self.sign(&payload_json)
        );
        (
            AuthState::Authenticated(identity),
            Some(IssuedCookie {
                name: self.config.cookie.name.clone(),
                value,
                expires_unix,
            }),
        )
    }

    pub fn authenticate_cookie(&self, raw_value: &str, now_unix: u64) -> AuthState {
        let Some((payload_b64, signature)) = raw_value.split_once('.') else {
            return AuthState::Unauthenticated;
        };
        let Ok(payload_bytes) = BASE64.decode(payload_b64) else {
            return AuthState::Unauthenticated;
        };
        let Ok(payload_json) = String::from_utf8(payload_bytes) else {
            return AuthState::Unauthenticated;
        };
        if self.sign(&payload_json) != signature {
            return AuthState::Unauthenticated;
        }
        let Ok(payload) = serde_json::from_str::<CookiePayload>(&payload_json) else {
            return AuthState::Unauthenticated;
        };
        if payload.schema_version != CREDENTIALS_SCHEMA_VERSION
            || payload.expires_unix <= now_unix
        {
            return AuthState::Unauthenticated;
        }
        // A user removed from the file since issuing is no longer welcome.
        if !self.config.users.contains_key(&payload.username) {
            return AuthState::Unauthenticated;
        }
        match Identity::v1(payload.name, payload.username) {
            Ok(identity) => AuthState::Authenticated(identity),
            Err(_) => AuthState::Unauthenticated,
        }
    }

    fn sign(&self, payload_json: &str) -> String {
        sha256_hex(&[
            self.config.cookie.key.as_bytes(),
            b".",
            payload_json.as_bytes(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn config_with_user(username: &str, password: &str) -> CredentialConfig {
        let salt_hex = "00112233445566778899aabbccddeeff".to_string();
        let mut users = BTreeMap::new();
        users.insert(
            username.to_string(),
            CredentialUser {
                name: "Dr. Example".to_string(),
                password_sha256_hex: hash_password(&salt_hex, password),
                salt_hex,
            },
        );
        CredentialConfig {
            schema_version: 1,
            cookie: CookieConfig {
                name: "icl_sizing_session".to_string(),
                key: "0123456789abcdef0123456789abcdef".to_string(),
                expiry_days: 30,
            },
            users,
            preauthorized: Vec::new(),
        }
    }

    fn temp_path(tag: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(1);
        std::env::temp_dir().join(format!("icl-credentials-{tag}-{suffix}.json"))
    }

    #[test]
    fn login_and_cookie_roundtrip() {
        let runtime = CredentialAuthRuntime::new(config_with_user("drx", "hunter2")).unwrap();
        let (state, cookie) = runtime.login("drx", "hunter2", 1_000);
        let identity = state.identity().cloned().expect("authenticated");
        assert_eq!(identity.username, "drx");
        assert_eq!(identity.name, "Dr. Example");
        let cookie = cookie.expect("cookie issued");
        assert_eq!(cookie.name, "icl_sizing_session");
        assert_eq!(cookie.expires_unix, 1_000 + 30 * 86_400);

        let restored = runtime.authenticate_cookie(&cookie.value, 2_000);
        assert_eq!(restored.identity().map(|i| i.username.as_str()), Some("drx"));
    }

    #[test]
    fn wrong_password_is_rejected_not_unauthenticated() {
        let runtime = CredentialAuthRuntime::new(config_with_user("drx", "hunter2")).unwrap();
        let (state, cookie) = runtime.login("drx", "wrong", 1_000);
        assert_eq!(state, AuthState::Rejected);
        assert!(cookie.is_none());
        let (state, _) = runtime.login("nobody", "hunter2", 1_000);
        assert_eq!(state, AuthState::Rejected);
    }

    #[test]
    fn tampered_cookie_is_unauthenticated() {
        let runtime = CredentialAuthRuntime::new(config_with_user("drx", "hunter2")).unwrap();
        let (_, cookie) = runtime.login("drx", "hunter2", 1_000);
        let mut value = cookie.unwrap().value;
        value.pop();
        value.push('0');
        assert_eq!(runtime.authenticate_cookie(&value, 2_000), AuthState::Unauthenticated);
        assert_eq!(
            runtime.authenticate_cookie("garbage", 2_000),
            AuthState::Unauthenticated
        );
    }

    #[test]
    fn expired_cookie_is_unauthenticated() {
        let runtime = CredentialAuthRuntime::new(config_with_user("drx", "hunter2")).unwrap();
        let (_, cookie) = runtime.login("drx", "hunter2", 1_000);
        let value = cookie.unwrap().value;
        let past_expiry = 1_000 + 30 * 86_400;
        assert_eq!(
            runtime.authenticate_cookie(&value, past_expiry),
            AuthState::Unauthenticated
        );
    }

    #[test]
    fn config_save_load_roundtrip() {
        let config = config_with_user("drx", "hunter2");
        let path = temp_path("roundtrip");
        config.save(&path).unwrap();
        let loaded = CredentialConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = temp_path("missing");
        assert!(matches!(
            CredentialConfig::load(&path),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn short_cookie_key_fails_fast() {
        let mut config = config_with_user("drx", "hunter2");
        config.cookie.key = "short".to_string();
        assert!(matches!(
            CredentialAuthRuntime::new(config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
