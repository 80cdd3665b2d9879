/// Configuration management for the keyring frontend
use crate::error::{KeyringError, KeyringResult};
use crate::identity::MAX_NEGATIVE_TTL;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    /// Frontend certificate and private key. Absence is fatal at startup.
    pub frontend: Option<FrontendConfig>,
    pub defaults: DefaultsConfig,
    pub identity: IdentityConfig,
    pub rate_limit: RateLimitConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Which key store backs the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub key_db: PathBuf,
    pub backend: StoreBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_directory = PathBuf::from("./data");
        Self {
            key_db: data_directory.join("keys.sqlite"),
            data_directory,
            backend: StoreBackend::Sqlite,
        }
    }
}

/// The frontend's own key material (PEM text)
#[derive(Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub certificate: String,
    pub private_key: String,
}

impl std::fmt::Debug for FrontendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontendConfig")
            .field("certificate", &format!("{} bytes", self.certificate.len()))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Defaults for tunables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Negative cache lifetime for unenrolled clients, in seconds.
    /// 0 selects the built-in default, a negative value disables the cache.
    pub unauthenticated_lru_timeout_sec: i64,
}

/// Identity configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Tenant qualifier appended to enrolled client ids (none for the root org)
    pub org_id: Option<String>,
}

/// Rate limiting configuration for unauthenticated enrollment traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub enroll_requests_per_second: u32,
    pub enroll_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enroll_requests_per_second: 50,
            enroll_burst: 100,
        }
    }
}

/// Operator access to administrative routes
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer token for admin routes. Unset disables them.
    pub token: Option<String>,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "endpoint_keyring=debug,tower_http=debug";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> KeyringResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any name-to-value source
    pub fn from_lookup<F>(var: F) -> KeyringResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = var("KEYRING_HOSTNAME").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("KEYRING_PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse()
            .map_err(|_| KeyringError::Validation("Invalid port number".to_string()))?;

        let data_directory: PathBuf = var("KEYRING_DATA_DIRECTORY")
            .unwrap_or_else(|| "./data".to_string())
            .into();
        let key_db = var("KEYRING_KEY_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_directory.join("keys.sqlite"));
        let backend = match var("KEYRING_STORE")
            .unwrap_or_else(|| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => StoreBackend::Sqlite,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(KeyringError::Validation(format!(
                    "Unknown key store backend: {}",
                    other
                )))
            }
        };

        let certificate = read_pem_setting(&var, "KEYRING_FRONTEND_CERTIFICATE")?;
        let private_key = read_pem_setting(&var, "KEYRING_FRONTEND_PRIVATE_KEY")?;
        let frontend = match (certificate, private_key) {
            (Some(certificate), Some(private_key)) => Some(FrontendConfig {
                certificate,
                private_key,
            }),
            _ => None,
        };

        let unauthenticated_lru_timeout_sec = var("KEYRING_UNAUTHENTICATED_LRU_TIMEOUT_SEC")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "0".to_string())
            .parse()
            .map_err(|_| {
                KeyringError::Validation("Invalid negative cache timeout".to_string())
            })?;

        let org_id = var("KEYRING_ORG_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let rate_limit_enabled = var("KEYRING_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|| "true".to_string())
            .parse()
            .unwrap_or(true);
        let enroll_requests_per_second = var("KEYRING_ENROLL_RPS")
            .unwrap_or_else(|| "50".to_string())
            .parse()
            .unwrap_or(50);
        let enroll_burst = var("KEYRING_ENROLL_BURST")
            .unwrap_or_else(|| "100".to_string())
            .parse()
            .unwrap_or(100);

        let admin_token = var("KEYRING_ADMIN_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let log_level = var("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let log_json = var("KEYRING_LOG_JSON")
            .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            storage: StorageConfig {
                data_directory,
                key_db,
                backend,
            },
            frontend,
            defaults: DefaultsConfig {
                unauthenticated_lru_timeout_sec,
            },
            identity: IdentityConfig { org_id },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                enroll_requests_per_second,
                enroll_burst,
            },
            admin: AdminConfig { token: admin_token },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> KeyringResult<()> {
        if self.service.hostname.is_empty() {
            return Err(KeyringError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.service.port == 0 {
            return Err(KeyringError::Validation("Port cannot be zero".to_string()));
        }

        let max_timeout = MAX_NEGATIVE_TTL.as_secs();
        if self.defaults.unauthenticated_lru_timeout_sec > max_timeout as i64 {
            return Err(KeyringError::Validation(format!(
                "Negative cache timeout cannot exceed {} seconds",
                max_timeout
            )));
        }

        if let Some(org_id) = &self.identity.org_id {
            if !org_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(KeyringError::Validation(format!(
                    "Org id contains invalid characters: {}",
                    org_id
                )));
            }
        }

        Ok(())
    }
}

/// Read a PEM blob either inline (`NAME`) or from a file (`NAME_FILE`)
fn read_pem_setting<F>(var: &F, name: &str) -> KeyringResult<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = var(name) {
        if !value.trim().is_empty() {
            // Allow single-line values with escaped newlines
            return Ok(Some(value.replace("\\n", "\n")));
        }
    }

    match var(&format!("{}_FILE", name)) {
        Some(path) if !path.trim().is_empty() => Ok(Some(std::fs::read_to_string(path.trim())?)),
        _ => Ok(None),
    }
}
