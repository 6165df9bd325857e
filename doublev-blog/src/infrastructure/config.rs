use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs on the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub http_host: String,
    pub http_port: u16,
    pub admin_url_prefix: String,
    pub jwt_secret: String,
    pub cors_allowed_origins: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| DatabaseConfig {
                url,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            });

        Ok(Self {
            database,
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            admin_url_prefix: env::var("ADMIN_URL_PREFIX").unwrap_or_else(|_| "/admin".to_string()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            // Получаем разрешенные CORS домены из .env
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:8000,http://127.0.0.1:8000".to_string()),
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DATABASE_URL",
        "DATABASE_MAX_CONNECTIONS",
        "HTTP_HOST",
        "HTTP_PORT",
        "ADMIN_URL_PREFIX",
        "JWT_SECRET",
        "CORS_ALLOWED_ORIGINS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn defaults_without_database() {
        clear_env();
        env::set_var("JWT_SECRET", "test-secret");

        let config = AppConfig::from_env().unwrap();
        assert!(config.database.is_none());
        assert_eq!(config.http_addr(), "0.0.0.0:3000");
        assert_eq!(config.admin_url_prefix, "/admin");
        clear_env();
    }

    #[test]
    #[serial]
    fn reads_database_settings() {
        clear_env();
        env::set_var("JWT_SECRET", "test-secret");
        env::set_var("DATABASE_URL", "postgres://localhost/blog");
        env::set_var("DATABASE_MAX_CONNECTIONS", "12");
        env::set_var("HTTP_PORT", "not-a-port");

        let config = AppConfig::from_env().unwrap();
        let database = config.database.unwrap();
        assert_eq!(database.url, "postgres://localhost/blog");
        assert_eq!(database.max_connections, 12);
        assert_eq!(config.http_port, 3000);
        clear_env();
    }

    #[test]
    #[serial]
    fn jwt_secret_is_required() {
        clear_env();
        assert!(AppConfig::from_env().is_err());
    }
}
