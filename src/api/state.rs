use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::api::routes::classify::Pages;
use crate::chat::Relay;
use crate::core::AppConfig;
use crate::vision::Vision;

pub struct AppState {
    pub config: AppConfig,
    pub relay: Arc<Relay>,
    pub vision: Arc<Vision>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(config: AppConfig, relay: Relay, vision: Vision) -> Result<Self> {
        Ok(Self {
            config,
            relay: Arc::new(relay),
            vision: Arc::new(vision),
            pages: Arc::new(Pages::new()?),
        })
    }
}

pub type SharedState = Arc<RwLock<AppState>>;
