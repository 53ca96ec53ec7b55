// Application state module
// Shared by every connection: configuration plus the resource index

use std::sync::Arc;

use super::types::Config;
use crate::center::ResourceCenter;

/// Application state
pub struct AppState {
    pub config: Config,
    pub center: Arc<ResourceCenter>,
}

impl AppState {
    pub fn new(config: &Config, center: Arc<ResourceCenter>) -> Self {
        Self {
            config: config.clone(),
            center,
        }
    }
}
