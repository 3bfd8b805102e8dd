use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Root directory; each namespace gets a subdirectory
    #[serde(default = "default_cache_root")]
    pub root_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the template API
    #[serde(default = "default_upstream_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Token sent as `Api-Token` header
    #[serde(default)]
    pub api_token: Option<String>,
    /// Page size for list fetches
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    /// Maximum pages followed in one list sync
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchConfig {
    /// Deadline for a whole prefetch batch in seconds
    #[serde(default = "default_prefetch_timeout")]
    pub timeout_secs: u64,
    /// Image cache directory name under the cache root
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Title of the parsing-error placeholder
    #[serde(default = "default_error_title")]
    pub error_title: String,
    /// Subtitle of the parsing-error placeholder
    #[serde(default = "default_error_subtitle")]
    pub error_subtitle: String,
    /// Maximum nesting of template references
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// How long a message's render state is kept after its last change
    #[serde(default = "default_state_retention")]
    pub state_retention_secs: u64,
    /// How often expired render states are swept
    #[serde(default = "default_state_cleanup_interval")]
    pub state_cleanup_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_cache_root() -> String {
    "./template_cache".to_string()
}

fn default_upstream_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_page_limit() -> usize {
    100
}

fn default_max_pages() -> usize {
    50
}

fn default_prefetch_timeout() -> u64 {
    10
}

fn default_image_dir() -> String {
    "template_images".to_string()
}

fn default_error_title() -> String {
    "(Unknown message type)".to_string()
}

fn default_error_subtitle() -> String {
    "This message could not be displayed.".to_string()
}

fn default_max_depth() -> usize {
    4
}

fn default_state_retention() -> u64 {
    300
}

fn default_state_cleanup_interval() -> u64 {
    60
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("cache.root_dir", default_cache_root())?
            .set_default("upstream.base_url", default_upstream_url())?
            .set_default("prefetch.timeout_secs", default_prefetch_timeout() as i64)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // TEMPLATE_CACHE__SERVER__PORT, TEMPLATE_CACHE__CACHE__ROOT_DIR, ...
            .add_source(
                Environment::with_prefix("TEMPLATE_CACHE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_dir: default_cache_root(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            request_timeout_secs: default_request_timeout(),
            api_token: None,
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_prefetch_timeout(),
            image_dir: default_image_dir(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            error_title: default_error_title(),
            error_subtitle: default_error_subtitle(),
            max_depth: default_max_depth(),
            state_retention_secs: default_state_retention(),
            state_cleanup_interval_secs: default_state_cleanup_interval(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
            upstream: UpstreamConfig::default(),
            prefetch: PrefetchConfig::default(),
            render: RenderConfig::default(),
        }
    }
}
