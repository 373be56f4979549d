//! Service configuration, read from the environment.

use std::path::PathBuf;

use crate::render::BlockSet;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub upload_url_prefix: String,
    pub max_upload_bytes: usize,
    /// Also render list, cta, columns and richtext blocks.
    pub extended_blocks: bool,
    pub jwt_secret: String,
    pub site_url: String,
    pub admin_email: String,
    /// bcrypt hash, or a plain password to hash at seed time.
    pub admin_password: AdminPassword,
}

#[derive(Debug, Clone)]
pub enum AdminPassword {
    Hashed(String),
    Plain(String),
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

impl Default for AppConfig {
    fn default() -> Self {
        let admin_password = if let Ok(hash) = std::env::var("ADMIN_HASH_PASSWORD") {
            AdminPassword::Hashed(hash)
        } else {
            AdminPassword::Plain(env_or("ADMIN_PASSWORD", "admin123"))
        };

        Self {
            host: env_or("HOST", "127.0.0.1"),
            port: env_parse("PORT", 3001),
            environment: env_or("ENVIRONMENT", "development"),
            data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            upload_url_prefix: env_or("UPLOAD_URL_PREFIX", "/uploads"),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            extended_blocks: env_parse("EXTENDED_BLOCKS", false),
            jwt_secret: env_or("JWT_SECRET", DEFAULT_JWT_SECRET),
            site_url: env_or("SITE_URL", "http://localhost:3001"),
            admin_email: env_or("ADMIN_EMAIL", "admin@example.com"),
            admin_password,
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn block_set(&self) -> BlockSet {
        if self.extended_blocks {
            BlockSet::Extended
        } else {
            BlockSet::Core
        }
    }

    /// Configuration for tests: in-repo defaults, never the process environment.
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            data_dir: PathBuf::from("data"),
            upload_dir,
            upload_url_prefix: "/uploads".to_string(),
            max_upload_bytes: 1024 * 1024,
            extended_blocks: false,
            jwt_secret: "test-secret".to_string(),
            site_url: "https://example.test".to_string(),
            admin_email: "admin@example.test".to_string(),
            admin_password: AdminPassword::Plain("admin123".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_env_or_fallback() {
        let config = AppConfig::default();
        assert!(!config.host.is_empty());
        assert!(config.max_upload_bytes >= 1);
        assert!(!config.jwt_secret.is_empty());
        assert!(config.upload_url_prefix.starts_with('/'));
    }

    #[test]
    fn test_is_production() {
        let mut config = AppConfig::for_tests(PathBuf::from("uploads"));
        assert!(!config.is_production());
        config.environment = "production".to_string();
        assert!(config.is_production());
    }

    #[test]
    fn test_block_set_follows_flag() {
        let mut config = AppConfig::for_tests(PathBuf::from("uploads"));
        assert_eq!(config.block_set(), BlockSet::Core);
        config.extended_blocks = true;
        assert_eq!(config.block_set(), BlockSet::Extended);
    }
}
