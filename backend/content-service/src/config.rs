/// Configuration management for the content service
///
/// Everything is read from environment variables (a `.env` file is loaded
/// first in development). Unsafe combinations are rejected when
/// `APP_ENV=production`.
use content_model::DistributionMode;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub household: HouseholdConfig,
    pub realtime: RealtimeConfig,
    pub media: MediaConfig,
    pub content: ContentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// In-process tables; nothing survives a restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdConfig {
    /// Hex SHA-256 of the shared access code
    pub access_code_sha256: String,
    /// Members served by the static resolver when running without Postgres
    #[serde(default)]
    pub members: Vec<MemberSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSeed {
    pub phone: String,
    pub display_name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub mode: DistributionMode,
    pub poll_interval_ms: u64,
    /// Cross-instance fan-out; single-instance push when unset
    pub redis_url: Option<String>,
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Uploads are disabled when no bucket is configured
    pub bucket: Option<String>,
    pub public_base_url: String,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub list_default: i64,
    pub list_max: i64,
}

/// Digest of the development access code `hearth`.
const DEV_ACCESS_CODE_SHA256: &str =
    "fe586323e9793abc1c207b55b40f0dd301c9a006761d8f7d5ee5feeeb8082d86";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let store = match std::env::var("STORE_BACKEND") {
            Ok(value) => parse_store_backend(&value)?,
            Err(_) => StoreBackend::Postgres,
        };
        if production && store == StoreBackend::Memory {
            return Err("STORE_BACKEND=memory is not allowed in production".to_string());
        }

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("CONTENT_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("CONTENT_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8081),
                store,
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if production => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if production && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/hearth".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            household: {
                let access_code_sha256 = match std::env::var("HOUSEHOLD_ACCESS_CODE_SHA256") {
                    Ok(value) if !value.trim().is_empty() => value.trim().to_ascii_lowercase(),
                    _ if production => {
                        return Err(
                            "HOUSEHOLD_ACCESS_CODE_SHA256 must be set in production".to_string()
                        )
                    }
                    _ => DEV_ACCESS_CODE_SHA256.to_string(),
                };
                if production && access_code_sha256 == DEV_ACCESS_CODE_SHA256 {
                    return Err(
                        "HOUSEHOLD_ACCESS_CODE_SHA256 must not be the development code".to_string(),
                    );
                }

                HouseholdConfig {
                    access_code_sha256,
                    members: match std::env::var("HOUSEHOLD_MEMBERS") {
                        Ok(raw) => parse_member_seeds(&raw)?,
                        Err(_) => Vec::new(),
                    },
                }
            },
            realtime: RealtimeConfig {
                mode: match std::env::var("REALTIME_MODE") {
                    Ok(value) => value.parse()?,
                    Err(_) => DistributionMode::Push,
                },
                poll_interval_ms: parse_env_or_default("POLL_INTERVAL_MS", 2_000)?,
                redis_url: std::env::var("REDIS_URL")
                    .ok()
                    .filter(|url| !url.trim().is_empty()),
                channel: std::env::var("REALTIME_CHANNEL")
                    .unwrap_or_else(|_| crate::realtime::relay::DEFAULT_CHANNEL.to_string()),
            },
            media: MediaConfig {
                bucket: std::env::var("MEDIA_BUCKET")
                    .ok()
                    .filter(|bucket| !bucket.trim().is_empty()),
                public_base_url: std::env::var("MEDIA_PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:9000/hearth-media".to_string()),
                max_bytes: parse_env_or_default("MEDIA_MAX_BYTES", 25 * 1024 * 1024)?,
            },
            content: {
                let list_default = parse_env_or_default("CONTENT_LIST_DEFAULT", 50)?;
                let list_max = parse_env_or_default("CONTENT_LIST_MAX", 200)?;
                if list_default < 1 || list_max < list_default {
                    return Err(format!(
                        "CONTENT_LIST_DEFAULT ({}) must be between 1 and CONTENT_LIST_MAX ({})",
                        list_default, list_max
                    ));
                }
                ContentConfig {
                    list_default,
                    list_max,
                }
            },
        })
    }
}

fn parse_store_backend(value: &str) -> Result<StoreBackend, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
        "memory" | "mem" => Ok(StoreBackend::Memory),
        other => Err(format!("unknown STORE_BACKEND '{}'", other)),
    }
}

/// `phone=Name[:admin]` entries separated by commas.
fn parse_member_seeds(raw: &str) -> Result<Vec<MemberSeed>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (phone, rest) = entry
                .split_once('=')
                .ok_or_else(|| format!("HOUSEHOLD_MEMBERS entry '{}' is missing '='", entry))?;
            let (name, is_admin) = match rest.rsplit_once(':') {
                Some((name, flag)) if flag.eq_ignore_ascii_case("admin") => (name, true),
                _ => (rest, false),
            };
            if phone.trim().is_empty() || name.trim().is_empty() {
                return Err(format!("HOUSEHOLD_MEMBERS entry '{}' is incomplete", entry));
            }
            Ok(MemberSeed {
                phone: phone.trim().to_string(),
                display_name: name.trim().to_string(),
                is_admin,
            })
        })
        .collect()
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
