//! Kisan-AI: farmer-facing chat assistant, groundwater dashboard data and
//! UI string tables served over HTTP.

pub mod chat;
pub mod config;
pub mod data;
pub mod model;
pub mod web;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tera::Tera;
use uuid::Uuid;

use chat::ChatSession;
use config::{ChatSettings, Config};
use data::i18n::Translations;
use data::water::WaterDataset;
use model::{Gateway, GeminiClient};

// App state structure
pub struct AppState {
    tera: Tera,
    gateway: Arc<dyn Gateway>,
    chat_settings: ChatSettings,
    sessions: Mutex<HashMap<Uuid, ChatSession>>,
    water: WaterDataset,
    translations: Translations,
}

impl AppState {
    /// Loads templates and static data and builds the gateway client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let water_path = config.data_dir.join("water.json");
        let water = WaterDataset::load(&water_path)
            .with_context(|| format!("loading groundwater data from {}", water_path.display()))?;

        let translations_dir = config.data_dir.join("translations");
        let translations = Translations::load(&translations_dir)
            .with_context(|| format!("loading translations from {}", translations_dir.display()))?;

        let mut tera = Tera::new("templates/**/*").context("parsing templates")?;
        tera.autoescape_on(vec![".html"]);

        // Missing credentials are reported per chat attempt, not at startup
        let gateway: Arc<dyn Gateway> = Arc::new(GeminiClient::new(config.gateway.clone()));

        Ok(Self {
            tera,
            gateway,
            chat_settings: config.chat,
            sessions: Mutex::new(HashMap::new()),
            water,
            translations,
        })
    }
}
