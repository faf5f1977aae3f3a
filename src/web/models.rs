use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::i18n::Language;
use crate::data::water::{CityWater, WaterStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
    pub lang: Option<Language>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: Uuid,
    pub error: Option<String>,
    pub cooldown_remaining_secs: u64,
}

/// Body returned when a submit is rejected locally.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub error: String,
    pub key: String,
    pub session_id: Uuid,
    pub cooldown_remaining_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DraftRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CitySummary<'a> {
    pub city: &'a str,
    pub state: &'a str,
    pub water_level: f64,
    pub status: WaterStatus,
}

impl<'a> From<&'a CityWater> for CitySummary<'a> {
    fn from(city: &'a CityWater) -> Self {
        Self {
            city: &city.city,
            state: &city.state,
            water_level: city.water_level,
            status: WaterStatus::from_level(city.water_level),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CityReport<'a> {
    #[serde(flatten)]
    pub data: &'a CityWater,
    pub status: WaterStatus,
}
