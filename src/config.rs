//! Configuration types for novel-dl

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Placeholder substituted with the chapter id in mirror URL templates
pub const CHAPTER_ID_PLACEHOLDER: &str = "{chapter_id}";

/// Download behavior configuration (directories, chunking, timeouts)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    ///
    /// Each book gets a `{book_id}/` subdirectory holding its `.txt` artifact;
    /// checkpoints live next to those directories as `{book_id}_progress.json`.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Number of chapters fetched concurrently per chunk (default: 20)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Timeout applied to every network call (default: 15 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Maximum tasks downloading at the same time (default: 4)
    ///
    /// Tasks beyond this limit stay `running` and wait for a slot.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            chunk_size: default_chunk_size(),
            request_timeout: default_request_timeout(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

/// Origin service endpoints and device identity used for the handshake
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Base URL of the batch content and key registration API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL of the public web site (chapter directory and book pages)
    #[serde(default = "default_web_base_url")]
    pub web_base_url: String,

    /// Install identifier sent as the `install_id` cookie
    #[serde(default = "default_install_id")]
    pub install_id: String,

    /// Device identifier encoded into the key registration payload
    #[serde(default = "default_server_device_id")]
    pub server_device_id: String,

    /// Application id query parameter
    #[serde(default = "default_aid")]
    pub aid: String,

    /// Client version query parameter
    #[serde(default = "default_update_version_code")]
    pub update_version_code: String,

    /// Skip TLS certificate verification (some mirrors use self-signed certificates)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            web_base_url: default_web_base_url(),
            install_id: default_install_id(),
            server_device_id: default_server_device_id(),
            aid: default_aid(),
            update_version_code: default_update_version_code(),
            accept_invalid_certs: false,
        }
    }
}

/// One unauthenticated mirror endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Name used in logs
    pub name: String,

    /// URL template containing `{chapter_id}`
    pub url_template: String,
}

impl MirrorConfig {
    /// Create a mirror entry
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
        }
    }

    /// Substitute the chapter id into the template
    pub fn url_for(&self, chapter_id: &str) -> String {
        self.url_template
            .replace(CHAPTER_ID_PLACEHOLDER, &urlencoding::encode(chapter_id))
    }
}

/// Retry behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Retention windows for finished tasks and checkpoints
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// How long a terminal task (and its artifact) is kept (default: 24 hours)
    #[serde(default = "default_day", with = "duration_serde")]
    pub task_retention: Duration,

    /// How often the janitor runs (default: 1 hour)
    #[serde(default = "default_cleanup_interval", with = "duration_serde")]
    pub cleanup_interval: Duration,

    /// Checkpoints older than this are ignored on resume (default: 24 hours)
    #[serde(default = "default_day", with = "duration_serde")]
    pub checkpoint_max_age: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            task_retention: default_day(),
            cleanup_interval: default_cleanup_interval(),
            checkpoint_max_age: default_day(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind API server (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration for NovelDownloader
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Origin service settings
    #[serde(default)]
    pub origin: OriginConfig,

    /// Ordered fallback mirrors, tried only when the origin path fails
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<MirrorConfig>,

    /// Retry settings for catalog resolution and the handshake
    #[serde(default)]
    pub retry: RetryConfig,

    /// Retention windows
    #[serde(default)]
    pub retention: RetentionConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig::default(),
            origin: OriginConfig::default(),
            mirrors: default_mirrors(),
            retry: RetryConfig::default(),
            retention: RetentionConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Check settings that would make the downloader misbehave
    pub fn validate(&self) -> Result<()> {
        if self.download.chunk_size == 0 {
            return Err(Error::Config {
                message: "chunk_size must be at least 1".to_string(),
                key: Some("chunk_size".to_string()),
            });
        }
        if self.download.max_concurrent_tasks == 0 {
            return Err(Error::Config {
                message: "max_concurrent_tasks must be at least 1".to_string(),
                key: Some("max_concurrent_tasks".to_string()),
            });
        }
        for (key, value) in [
            ("origin.api_base_url", &self.origin.api_base_url),
            ("origin.web_base_url", &self.origin.web_base_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                return Err(Error::Config {
                    message: format!("{key} '{value}' is not a valid URL: {e}"),
                    key: Some(key.to_string()),
                });
            }
        }
        if let Some(mirror) = self
            .mirrors
            .iter()
            .find(|m| !m.url_template.contains(CHAPTER_ID_PLACEHOLDER))
        {
            return Err(Error::Config {
                message: format!(
                    "mirror '{}' URL template lacks {}",
                    mirror.name, CHAPTER_ID_PLACEHOLDER
                ),
                key: Some("mirrors".to_string()),
            });
        }
        Ok(())
    }

    /// Get the download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_chunk_size() -> usize {
    20
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_concurrent_tasks() -> usize {
    4
}

fn default_api_base_url() -> String {
    "https://api5-normal-sinfonlineb.fqnovel.com".to_string()
}

fn default_web_base_url() -> String {
    "https://fanqienovel.com".to_string()
}

fn default_install_id() -> String {
    "4427064614339001".to_string()
}

fn default_server_device_id() -> String {
    "4427064614334905".to_string()
}

fn default_aid() -> String {
    "1967".to_string()
}

fn default_update_version_code() -> String {
    "62532".to_string()
}

fn default_mirrors() -> Vec<MirrorConfig> {
    vec![
        MirrorConfig::new(
            "cenguigui",
            "https://api.cenguigui.cn/api/tomato/content.php?item_id={chapter_id}",
        ),
        MirrorConfig::new("zyii", "https://lsjk.zyii.xyz:3666/content?item_id={chapter_id}"),
    ]
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_day() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_origin_contract() {
        let config = Config::default();
        assert_eq!(config.download.chunk_size, 20);
        assert_eq!(config.download.request_timeout, Duration::from_secs(15));
        assert_eq!(config.origin.aid, "1967");
        assert_eq!(config.origin.update_version_code, "62532");
        assert_eq!(
            config.retention.checkpoint_max_age,
            Duration::from_secs(86_400)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_has_two_mirrors_in_order() {
        let from_default = Config::default();
        let from_empty_json: Config = serde_json::from_str("{}").unwrap();

        for config in [from_default, from_empty_json] {
            assert_eq!(config.mirrors.len(), 2);
            assert_eq!(config.mirrors[0].name, "cenguigui");
            assert_eq!(config.mirrors[1].name, "zyii");
        }
    }

    #[test]
    fn mirror_url_substitutes_chapter_id() {
        let mirror = MirrorConfig::new("m", "https://m.example/content?item_id={chapter_id}");
        assert_eq!(
            mirror.url_for("7123"),
            "https://m.example/content?item_id=7123"
        );
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let mut config = Config::default();
        config.origin.web_base_url = "fanqienovel.com".to_string();

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("origin.web_base_url"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = Config::default();
        config.download.chunk_size = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "chunk_size"));
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let config = Config {
            mirrors: vec![MirrorConfig::new("broken", "https://m.example/content")],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn durations_deserialize_from_seconds() {
        let json = r#"{"download": {"request_timeout": 5, "chunk_size": 10}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.download.request_timeout, Duration::from_secs(5));
        assert_eq!(config.download.chunk_size, 10);
        assert_eq!(config.download.download_dir, PathBuf::from("downloads"));
    }
}
