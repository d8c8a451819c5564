use hocon::HoconLoader;
use serde::{Deserialize, Serialize};
use std::path::Path;

const INSECURE_JWT_SECRET: &str = "insecure-default-for-testing-only-change-in-production";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub avatar: AvatarConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// GridFS bucket (or blob table namespace) holding avatar images.
    #[serde(default = "default_blob_bucket")]
    pub blob_bucket: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvatarConfig {
    pub max_bytes: usize,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    pub default_page_size: u64,
    /// Answer 404 (instead of 200 with an empty `data`) when a page has no items.
    pub empty_page_is_not_found: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            empty_page_is_not_found: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    pub environment: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_blob_bucket() -> String {
    "avatars".to_string()
}

impl Default for Config {
    fn default() -> Self {
        // HOCON file first, then nested env keys, then flat env vars with defaults.
        let path = std::env::var("PLACEMENT_CONFIG").unwrap_or_else(|_| "application.conf".to_string());
        Self::from_hocon_path(&path).unwrap_or_else(|e| {
            tracing::warn!(
                "Failed to load HOCON config: {}. Falling back to environment variables.",
                e
            );
            Self::from_env().unwrap_or_else(|_| Self::from_env_fallback())
        })
    }
}

impl Config {
    /// Load configuration from HOCON file with environment variable substitution
    pub fn from_hocon() -> Result<Self, String> {
        Self::from_hocon_path("application.conf")
    }

    /// Load configuration from a specific HOCON file path
    pub fn from_hocon_path<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(format!("Configuration file not found: {}", path.display()));
        }

        let config: Self = HoconLoader::new()
            .load_file(path)
            .map_err(|e| format!("Failed to load HOCON file: {}", e))?
            .resolve()
            .map_err(|e| format!("Failed to parse and resolve HOCON: {}", e))?;
        config.validated()
    }

    /// Load configuration from an in-memory HOCON document
    pub fn from_hocon_str(source: &str) -> Result<Self, String> {
        let config: Self = HoconLoader::new()
            .load_str(source)
            .map_err(|e| format!("Failed to load HOCON source: {}", e))?
            .resolve()
            .map_err(|e| format!("Failed to parse and resolve HOCON: {}", e))?;
        config.validated()
    }

    /// Load from `PLACEMENT_*` environment variables using nested keys
    /// (e.g. `PLACEMENT_SERVER__PORT`).
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("PLACEMENT").separator("__"))
            .build()?;

        config
            .try_deserialize::<Self>()?
            .validated()
            .map_err(config::ConfigError::Message)
    }

    /// Reject values no environment can run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.listing.default_page_size == 0 {
            return Err("listing.default_page_size must be positive".to_string());
        }
        if self.avatar.max_bytes == 0 {
            return Err("avatar.max_bytes must be positive".to_string());
        }
        Ok(())
    }

    fn validated(self) -> Result<Self, String> {
        self.validate()?;
        Ok(self)
    }

    /// Fallback configuration from flat environment variables
    fn from_env_fallback() -> Self {
        let listing_defaults = ListingConfig::default();
        let avatar_defaults = AvatarConfig::default();

        Self {
            server: ServerConfig {
                host: std::env::var("PLACEMENT_SERVER_HOST")
                    .unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: std::env::var("PLACEMENT_SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            database: DatabaseConfig {
                url: std::env::var("PLACEMENT_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:placement.db?mode=rwc".to_string()),
                blob_bucket: std::env::var("PLACEMENT_BLOB_BUCKET")
                    .unwrap_or_else(|_| default_blob_bucket()),
            },
            jwt: JwtConfig {
                secret: std::env::var("PLACEMENT_JWT_SECRET").unwrap_or_else(|_| {
                    eprintln!("WARNING: PLACEMENT_JWT_SECRET not set. Using insecure default for testing only!");
                    eprintln!("NEVER use this in production! Set PLACEMENT_JWT_SECRET environment variable.");
                    INSECURE_JWT_SECRET.to_string()
                }),
            },
            avatar: AvatarConfig {
                max_bytes: std::env::var("PLACEMENT_AVATAR_MAX_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(avatar_defaults.max_bytes),
            },
            listing: ListingConfig {
                default_page_size: std::env::var("PLACEMENT_LISTING_DEFAULT_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(listing_defaults.default_page_size),
                empty_page_is_not_found: std::env::var("PLACEMENT_LISTING_EMPTY_PAGE_IS_NOT_FOUND")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(listing_defaults.empty_page_is_not_found),
            },
            runtime: RuntimeConfig {
                environment: std::env::var("PLACEMENT_ENV")
                    .unwrap_or_else(|_| RuntimeConfig::default().environment),
            },
        }
    }

    /// Validate configuration for production use
    pub fn validate_for_production(&self) -> Result<(), String> {
        // Check JWT secret is not the default
        if self.jwt.secret == INSECURE_JWT_SECRET {
            return Err("PLACEMENT_JWT_SECRET must be explicitly set for production. Generate a secure random string (minimum 32 characters).".to_string());
        }

        // Check JWT secret length
        if self.jwt.secret.len() < 32 {
            return Err(format!(
                "PLACEMENT_JWT_SECRET must be at least 32 characters long (current: {} characters)",
                self.jwt.secret.len()
            ));
        }

        self.validate()
    }

    /// Produce a version safe to log (secrets masked).
    pub fn sanitized(&self) -> Self {
        let mut clone = self.clone();
        clone.jwt.secret = "***MASKED***".to_string();
        clone.database.url = mask_url_credentials(&clone.database.url);
        clone
    }
}

/// Replace `user:password@` in a connection URL with a mask.
fn mask_url_credentials(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((_, host)) => format!("{scheme}://***MASKED***@{host}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        server { host = "0.0.0.0", port = 9090 }
        database { url = "mongodb://app:hunter2@db:27017/placement" }
        jwt { secret = "0123456789abcdef0123456789abcdef" }
        listing { default_page_size = 25, empty_page_is_not_found = false }
        runtime { environment = "production" }
    "#;

    #[test]
    fn parses_hocon_with_section_defaults() {
        let config = Config::from_hocon_str(SAMPLE).expect("parse sample config");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.blob_bucket, "avatars");
        assert_eq!(config.avatar.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.listing.default_page_size, 25);
        assert!(!config.listing.empty_page_is_not_found);
        assert!(config.runtime.is_production());
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn production_validation_rejects_weak_secrets() {
        let mut config = Config::from_hocon_str(SAMPLE).expect("parse sample config");
        config.jwt.secret = INSECURE_JWT_SECRET.to_string();
        assert!(config.validate_for_production().is_err());

        config.jwt.secret = "short".to_string();
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn zero_sizes_are_rejected_at_load_time() {
        let zero_page = SAMPLE.replace("default_page_size = 25", "default_page_size = 0");
        let err = Config::from_hocon_str(&zero_page).expect_err("zero page size");
        assert!(err.contains("default_page_size"), "{err}");

        let zero_avatar = format!("{SAMPLE}\navatar {{ max_bytes = 0 }}\n");
        let err = Config::from_hocon_str(&zero_avatar).expect_err("zero avatar size");
        assert!(err.contains("max_bytes"), "{err}");

        let mut config = Config::from_hocon_str(SAMPLE).expect("parse sample config");
        config.listing.default_page_size = 0;
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn sanitized_masks_secrets() {
        let config = Config::from_hocon_str(SAMPLE).expect("parse sample config");
        let clean = config.sanitized();
        assert_eq!(clean.jwt.secret, "***MASKED***");
        assert_eq!(clean.database.url, "mongodb://***MASKED***@db:27017/placement");
    }

    #[test]
    fn urls_without_credentials_are_untouched() {
        assert_eq!(mask_url_credentials("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            mask_url_credentials("mongodb://localhost:27017"),
            "mongodb://localhost:27017"
        );
    }
}
