//! Dependencies shared by every route group: the store and the API configuration.

use crate::config::ApiConfig;
use crate::store::DisasterStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DisasterStore>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DisasterStore>, config: ApiConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
