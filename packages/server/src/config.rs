use std::path::PathBuf;

use common::engine::default_allowed_types;
use common::storage::s3::S3Settings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// JWT role that carries the reviewer capability.
    #[serde(default = "default_reviewer_role")]
    pub reviewer_role: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

fn default_reviewer_role() -> String {
    "admin".to_string()
}

fn default_token_ttl_secs() -> i64 {
    24 * 3600
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem,
    S3,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub root: PathBuf,
    pub max_object_size: u64,
    /// Externally visible origin used in signed download links.
    pub public_base_url: String,
    /// Secret for filesystem download signatures. Falls back to the JWT secret.
    pub url_secret: Option<String>,
    pub signed_url_ttl_secs: u64,
    /// Accepted evidence MIME types; `image/*` matches any image subtype.
    pub allowed_types: Vec<String>,
    pub s3: Option<S3Settings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcileConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub grace_secs: i64,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub reconcile: ReconcileConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.url", "sqlite://carbonbook.db?mode=rwc")?
            .set_default("storage.backend", "filesystem")?
            .set_default("storage.root", "./data/evidence")?
            .set_default("storage.max_object_size", 10 * 1024 * 1024)?
            .set_default("storage.public_base_url", "http://127.0.0.1:3000")?
            .set_default("storage.signed_url_ttl_secs", 3600)?
            .set_default("storage.allowed_types", default_allowed_types())?
            .set_default("reconcile.enabled", true)?
            .set_default("reconcile.interval_secs", 3600)?
            .set_default("reconcile.grace_secs", 24 * 3600)?
            .set_default("reconcile.dry_run", false)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., CARBONBOOK__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("CARBONBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn url_secret(&self) -> &str {
        self.storage
            .url_secret
            .as_deref()
            .unwrap_or(&self.auth.jwt_secret)
    }
}
