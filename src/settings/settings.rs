use anyhow::{Result, anyhow};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub store: Store,
    #[serde(default)]
    pub sweeper: Sweeper,
    pub log: Log,
}

#[derive(Deserialize)]
pub struct Auth {
    #[serde(default = "default_secret_hasher")]
    pub secret_hasher: String, // "argon2" or "hmac"
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    /// Environment variable holding the signing key. Takes precedence over
    /// `signing_key`.
    #[serde(default = "default_signing_key_env")]
    pub signing_key_env: String,
    #[serde(default)]
    pub signing_key: Option<String>,
    /// Key for the "hmac" secret hasher. Must differ from the signing key.
    #[serde(default)]
    pub secret_hash_key: Option<String>,
}

// Keys stay out of `{:?}` output since settings are logged at startup.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("secret_hasher", &self.secret_hasher)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("signing_key_env", &self.signing_key_env)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field(
                "secret_hash_key",
                &self.secret_hash_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "mysql" or "memory"
    #[serde(default)]
    pub dsn: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Sweeper {
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
}

impl Default for Sweeper {
    fn default() -> Self {
        Sweeper {
            interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_secret_hasher() -> String {
    "argon2".to_string()
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_signing_key_env() -> String {
    "JWT_SECRET_KEY".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

impl Auth {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    pub fn signing_key(&self) -> Result<Vec<u8>> {
        let key = std::env::var(&self.signing_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.signing_key.clone().filter(|k| !k.is_empty()))
            .ok_or_else(|| {
                anyhow!(
                    "no signing key: set {} or auth.signing_key",
                    self.signing_key_env
                )
            })?;
        Ok(key.into_bytes())
    }

    pub fn secret_hash_key(&self) -> Result<Vec<u8>> {
        self.secret_hash_key
            .clone()
            .filter(|k| !k.is_empty())
            .map(String::into_bytes)
            .ok_or_else(|| anyhow!("auth.secret_hash_key is required for the hmac hasher"))
    }
}

impl Store {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Sweeper {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.auth.access_ttl_secs == 0 {
            return Err(anyhow!("auth.access_ttl_secs must be positive"));
        }
        if self.auth.refresh_ttl_secs <= self.auth.access_ttl_secs {
            return Err(anyhow!(
                "auth.refresh_ttl_secs ({}) must exceed auth.access_ttl_secs ({})",
                self.auth.refresh_ttl_secs,
                self.auth.access_ttl_secs
            ));
        }
        if self.store.timeout_ms == 0 {
            return Err(anyhow!("store.timeout_ms must be positive"));
        }
        if self.sweeper.interval_secs == 0 {
            return Err(anyhow!("sweeper.interval_secs must be positive"));
        }
        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "TOKENWARD";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    load(Config::builder().add_source(File::with_name(path)))
}

fn load(builder: ConfigBuilder<DefaultState>) -> Result<Settings> {
    let settings: Settings = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<Settings> {
        load(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn defaults_match_token_policy() {
        let settings = from_toml(
            r#"
[auth]
signing_key = "k"

[store]
backend = "memory"

[log]
filter = "info"
"#,
        )
        .unwrap();

        assert_eq!(settings.auth.access_ttl(), Duration::from_secs(900));
        assert_eq!(settings.auth.refresh_ttl(), Duration::from_secs(2_592_000));
        assert_eq!(settings.auth.secret_hasher, "argon2");
        assert_eq!(settings.store.timeout(), Duration::from_secs(5));
        assert_eq!(settings.sweeper.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn refresh_ttl_must_exceed_access_ttl() {
        let result = from_toml(
            r#"
[auth]
access_ttl_secs = 900
refresh_ttl_secs = 900

[store]
backend = "memory"

[log]
filter = "info"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("")).is_err());
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }

    #[test]
    fn inline_signing_key_is_used_when_env_is_unset() {
        let settings = from_toml(
            r#"
[auth]
signing_key_env = "TOKENWARD_TEST_UNSET_SIGNING_KEY"
signing_key = "inline-key"

[store]
backend = "memory"

[log]
filter = "info"
"#,
        )
        .unwrap();
        assert_eq!(settings.auth.signing_key().unwrap(), b"inline-key".to_vec());
    }

    #[test]
    fn missing_signing_key_is_an_error() {
        let settings = from_toml(
            r#"
[auth]
signing_key_env = "TOKENWARD_TEST_UNSET_SIGNING_KEY"

[store]
backend = "memory"

[log]
filter = "info"
"#,
        )
        .unwrap();
        assert!(settings.auth.signing_key().is_err());
        assert!(settings.auth.secret_hash_key().is_err());
    }

    #[test]
    fn debug_output_redacts_keys() {
        let settings = from_toml(
            r#"
[auth]
signing_key = "very-secret"
secret_hash_key = "also-secret"

[store]
backend = "memory"

[log]
filter = "info"
"#,
        )
        .unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("also-secret"));
    }
}
