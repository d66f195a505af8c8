#![forbid(unsafe_code)]

use std::path::Path;

use icl_engines::credential_auth::{
    hash_password, random_hex, CookieConfig, CredentialConfig, CredentialUser,
};

const DEFAULT_COOKIE_NAME: &str = "icl_sizing_session";
const DEFAULT_EXPIRY_DAYS: u16 = 30;
const SALT_BYTES: usize = 16;
const COOKIE_KEY_BYTES: usize = 32;

fn load_or_init(path: &Path) -> Result<CredentialConfig, String> {
    if path.exists() {
        CredentialConfig::load(path)
            .map_err(|e| format!("failed to load credentials file '{}': {e}", path.display()))
    } else {
        Ok(CredentialConfig {
            schema_version: 1,
            cookie: CookieConfig {
                name: DEFAULT_COOKIE_NAME.to_string(),
                key: random_hex(COOKIE_KEY_BYTES),
                expiry_days: DEFAULT_EXPIRY_DAYS,
            },
            users: Default::default(),
            preauthorized: Vec::new(),
        })
    }
}

fn save(config: &CredentialConfig, path: &Path) -> Result<(), String> {
    config
        .save(path)
        .map_err(|e| format!("failed to save credentials file '{}': {e}", path.display()))
}

pub fn execute_credentials_command(
    path: &Path,
    subcommand: &str,
    username: Option<&str>,
    display_name: Option<&str>,
    password: Option<&str>,
) -> Result<String, String> {
    match subcommand {
        "user-add" => {
            let username = require(username, "missing username")?;
            let display_name = require(display_name, "missing display name")?;
            let password = require(password, "missing password")?;
            let mut config = load_or_init(path)?;
            let salt_hex = random_hex(SALT_BYTES);
            config.users.insert(
                username.to_string(),
                CredentialUser {
                    name: display_name.to_string(),
                    password_sha256_hex: hash_password(&salt_hex, password),
                    salt_hex,
                },
            );
            save(&config, path)?;
            Ok("OK".to_string())
        }
        "user-del" => {
            let username = require(username, "missing username")?;
            let mut config = load_or_init(path)?;
            if config.users.remove(username).is_none() {
                return Err(format!("unknown user: {username}"));
            }
            save(&config, path)?;
            Ok("OK".to_string())
        }
        "user-ls" => {
            let config = load_or_init(path)?;
            Ok(config
                .users
                .iter()
                .map(|(username, user)| format!("{username}\t{}", user.name))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "cookie-init" => {
            let mut config = load_or_init(path)?;
            config.cookie.key = random_hex(COOKIE_KEY_BYTES);
            save(&config, path)?;
            Ok("OK".to_string())
        }
        _ => Err(format!(
            "unknown credentials subcommand: {subcommand}. expected one of: user-add, user-del, user-ls, cookie-init"
        )),
    }
}

fn require<'a>(value: Option<&'a str>, reason: &'static str) -> Result<&'a str, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::execute_credentials_command;
    use icl_engines::credential_auth::CredentialAuthRuntime;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file() -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(1);
        std::env::temp_dir().join(format!("icl-admin-test-{suffix}.json"))
    }

    #[test]
    fn added_user_can_log_in() {
        let path = temp_file();
        execute_credentials_command(
            &path,
            "user-add",
            Some("drx"),
            Some("Dr. Example"),
            Some("hunter2"),
        )
        .unwrap();

        let runtime = CredentialAuthRuntime::from_file(&path).unwrap();
        let (state, cookie) = runtime.login("drx", "hunter2", 1_000);
        assert_eq!(state.identity().map(|i| i.name.as_str()), Some("Dr. Example"));
        assert!(cookie.is_some());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn listing_and_removal_roundtrip() {
        let path = temp_file();
        execute_credentials_command(&path, "user-add", Some("a"), Some("Alpha"), Some("pw-a"))
            .unwrap();
        execute_credentials_command(&path, "user-add", Some("b"), Some("Beta"), Some("pw-b"))
            .unwrap();

        let listing = execute_credentials_command(&path, "user-ls", None, None, None).unwrap();
        assert_eq!(listing, "a\tAlpha\nb\tBeta");

        execute_credentials_command(&path, "user-del", Some("a"), None, None).unwrap();
        let listing = execute_credentials_command(&path, "user-ls", None, None, None).unwrap();
        assert_eq!(listing, "b\tBeta");

        assert!(
            execute_credentials_command(&path, "user-del", Some("nobody"), None, None).is_err()
        );
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn cookie_init_rotates_the_signing_key() {
        let path = temp_file();
        execute_credentials_command(&path, "user-add", Some("drx"), Some("Dr."), Some("pw"))
            .unwrap();
        let before = fs::read_to_string(&path).unwrap();
        execute_credentials_command(&path, "cookie-init", None, None, None).unwrap();
        let after = fs::read_to_string(&path).unwrap();
        assert_ne!(before, after);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unknown_subcommand_is_an_error() {
        let path = temp_file();
        assert!(execute_credentials_command(&path, "frobnicate", None, None, None).is_err());
    }
}
