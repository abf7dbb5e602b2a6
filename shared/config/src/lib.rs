use serde::Deserialize;
use std::path::Path;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (assembled from PG* variables when absent)
    #[serde(default)]
    pub database_url: String,

    /// Connection pool minimum size
    #[serde(default = "default_pool_min")]
    pub pool_min_connections: u32,

    /// Connection pool maximum size
    #[serde(default = "default_pool_max")]
    pub pool_max_connections: u32,

    /// S3-compatible endpoint for the image object store
    #[serde(default = "default_s3_endpoint")]
    pub s3_endpoint: String,

    /// Object store bucket holding product images
    #[serde(default = "default_s3_bucket")]
    pub s3_bucket: String,

    #[serde(default)]
    pub s3_access_key: String,

    #[serde(default)]
    pub s3_secret_key: String,

    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// DeepL API key for variant translation
    #[serde(default)]
    pub deepl_api_key: String,

    /// OpenAI API key for title/description generation
    #[serde(default)]
    pub openai_api_key: String,

    /// Gemini API key for the image content transform
    #[serde(default)]
    pub gemini_api_key: String,

    /// Upstream (Rakumart) API credentials
    #[serde(default)]
    pub rakumart_app_key: String,

    #[serde(default)]
    pub rakumart_app_secret: String,

    #[serde(default = "default_rakumart_search_url")]
    pub rakumart_search_url: String,

    #[serde(default = "default_rakumart_detail_url")]
    pub rakumart_detail_url: String,

    #[serde(default = "default_rakumart_image_id_url")]
    pub rakumart_image_id_url: String,

    /// Path of the JSON file holding marketplace credentials
    #[serde(default = "default_rakuten_config_path")]
    pub rakuten_config_path: String,

    /// Timeout for marketplace product/inventory calls, seconds
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    /// Timeout for image downloads, seconds
    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: u64,

    /// Timeout for Cabinet uploads, seconds
    #[serde(default = "default_cabinet_timeout")]
    pub cabinet_timeout_secs: u64,

    /// Whether the periodic keyword refresh task runs
    #[serde(default)]
    pub auto_refresh: bool,

    /// Refresh interval in seconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_pool_min() -> u32 {
    1
}

fn default_pool_max() -> u32 {
    20
}

fn default_s3_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_s3_bucket() -> String {
    "listing-images".to_string()
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_rakumart_search_url() -> String {
    "https://open.rakumart.com/api/onlineSearch".to_string()
}

fn default_rakumart_detail_url() -> String {
    "https://open.rakumart.com/api/goodsDetail".to_string()
}

fn default_rakumart_image_id_url() -> String {
    "https://open.rakumart.com/api/uploadImagePic".to_string()
}

fn default_rakuten_config_path() -> String {
    "rakuten_config.json".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_image_timeout() -> u64 {
    15
}

fn default_cabinet_timeout() -> u64 {
    60
}

fn default_refresh_interval() -> u64 {
    300
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder().add_source(config::Environment::default());
        let mut cfg: Config = builder.build()?.try_deserialize()?;

        if cfg.database_url.is_empty() {
            if let Some(url) = database_url_from_pg_vars() {
                cfg.database_url = url;
            }
        }

        Ok(cfg)
    }
}

/// Assemble a connection URL from the conventional PG* variables.
pub fn database_url_from_pg_vars() -> Option<String> {
    let host = std::env::var("PGHOST").ok()?;
    let port = std::env::var("PGPORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("PGUSER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("PGPASSWORD").unwrap_or_default();
    let database = std::env::var("PGDATABASE").unwrap_or_else(|_| "postgres".to_string());

    if password.is_empty() {
        Some(format!("postgres://{}@{}:{}/{}", user, host, port, database))
    } else {
        Some(format!(
            "postgres://{}:{}@{}:{}/{}",
            user, password, host, port, database
        ))
    }
}

/// Marketplace credentials stored in a JSON file.
///
/// Both file shapes are accepted: a flat object with `service_secret` and
/// `license_key`, or the same pair nested under a `"rakuten"` key.
#[derive(Debug, Clone, Deserialize)]
pub struct RakutenCredentials {
    pub service_secret: String,
    pub license_key: String,
}

#[derive(Debug, Deserialize)]
struct RakutenCredentialsFile {
    service_secret: Option<String>,
    license_key: Option<String>,
    rakuten: Option<RakutenCredentialsInner>,
}

#[derive(Debug, Deserialize)]
struct RakutenCredentialsInner {
    service_secret: Option<String>,
    license_key: Option<String>,
}

impl RakutenCredentials {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let file: RakutenCredentialsFile = serde_json::from_str(&raw)
            .map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?;

        let nested = file.rakuten;
        let service_secret = file
            .service_secret
            .or_else(|| nested.as_ref().and_then(|r| r.service_secret.clone()))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("service_secret missing in {}", path.display()))?;
        let license_key = file
            .license_key
            .or_else(|| nested.as_ref().and_then(|r| r.license_key.clone()))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("license_key missing in {}", path.display()))?;

        Ok(Self {
            service_secret,
            license_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_flat_shape() {
        let dir = std::env::temp_dir().join("shared_config_flat_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rakuten_config.json");
        std::fs::write(&path, r#"{"service_secret": "s", "license_key": "k"}"#).unwrap();

        let creds = RakutenCredentials::load(&path).unwrap();
        assert_eq!(creds.service_secret, "s");
        assert_eq!(creds.license_key, "k");
    }

    #[test]
    fn test_credentials_nested_shape() {
        let dir = std::env::temp_dir().join("shared_config_nested_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rakuten_config.json");
        std::fs::write(
            &path,
            r#"{"rakuten": {"service_secret": "s2", "license_key": "k2"}}"#,
        )
        .unwrap();

        let creds = RakutenCredentials::load(&path).unwrap();
        assert_eq!(creds.service_secret, "s2");
        assert_eq!(creds.license_key, "k2");
    }

    #[test]
    fn test_credentials_missing_key() {
        let dir = std::env::temp_dir().join("shared_config_missing_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rakuten_config.json");
        std::fs::write(&path, r#"{"service_secret": "s"}"#).unwrap();

        assert!(RakutenCredentials::load(&path).is_err());
    }
}
