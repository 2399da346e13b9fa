//! Shared application state for all routes. Built once at startup; the registry is read-only afterwards.

use crate::auth::JwtAuth;
use crate::model::ModelRegistry;
use crate::settings::Settings;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub auth: Arc<JwtAuth>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, settings: Settings) -> Self {
        AppState {
            registry,
            auth: Arc::new(JwtAuth::new(&settings.jwt_secret)),
            settings: Arc::new(settings),
        }
    }
}
