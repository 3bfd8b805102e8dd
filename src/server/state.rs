use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::error::AppError;
use crate::manager::TemplateManager;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub manager: Arc<TemplateManager>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, AppError> {
        let manager = Arc::new(TemplateManager::from_settings(&settings)?);
        Ok(Self::with_manager(settings, manager))
    }

    /// State around an existing manager (custom sources, tests)
    pub fn with_manager(settings: Settings, manager: Arc<TemplateManager>) -> Self {
        Self {
            settings: Arc::new(settings),
            manager,
            started_at: Utc::now(),
        }
    }
}
