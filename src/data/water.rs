use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::{read_json, DataError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdealWaterLevel {
    Yes,
    Mediocre,
    No,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterAdvisory {
    pub status: String,
    pub message: String,
    pub conservation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedPlants {
    pub low_water_requirement: Vec<String>,
    pub high_water_requirement: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityWater {
    pub city: String,
    pub state: String,
    /// Percentage of the normal groundwater level, 0 to 100.
    pub water_level: f64,
    pub ideal_water_level: IdealWaterLevel,
    pub water_quality: String,
    pub last_updated: String,
    pub water_advisory: WaterAdvisory,
    pub recommended_plants: RecommendedPlants,
}

/// Dashboard band for a water level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterStatus {
    Good,
    Moderate,
    Critical,
}

impl WaterStatus {
    pub fn from_level(level: f64) -> Self {
        if level >= 70.0 {
            WaterStatus::Good
        } else if level >= 40.0 {
            WaterStatus::Moderate
        } else {
            WaterStatus::Critical
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterDataset {
    city_data: Vec<CityWater>,
}

impl WaterDataset {
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let dataset: WaterDataset = read_json(path)?;
        info!("Loaded groundwater data for {} cities", dataset.city_data.len());
        Ok(dataset)
    }

    pub fn from_cities(city_data: Vec<CityWater>) -> Self {
        Self { city_data }
    }

    pub fn cities(&self) -> &[CityWater] {
        &self.city_data
    }

    /// Cities whose name contains `query`, ignoring case. An empty query
    /// matches everything.
    pub fn search(&self, query: &str) -> Vec<&CityWater> {
        let needle = query.trim().to_lowercase();
        self.city_data
            .iter()
            .filter(|c| c.city.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn find(&self, city: &str) -> Option<&CityWater> {
        let wanted = city.trim().to_lowercase();
        self.city_data.iter().find(|c| c.city.to_lowercase() == wanted)
    }
}
