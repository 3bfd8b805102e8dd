// Supporting modules
pub mod config;
pub mod error;
pub mod metrics;

// Domain layer
pub mod cache;
pub mod prefetch;
pub mod render;
pub mod sync;
pub mod template;

// Coordination
pub mod manager;

// Application layer
pub mod api;
pub mod server;

pub use manager::TemplateManager;
