mod settings;

pub use settings::{
    ApiConfig, CacheConfig, PrefetchConfig, RenderConfig, ServerConfig, Settings, UpstreamConfig,
};
