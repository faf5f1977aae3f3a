pub mod prompt;
pub mod types;

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use thiserror::Error;

use crate::config::GatewayConfig;
use types::{
    default_safety_settings, Content, ErrorEnvelope, GenerateRequest, GenerateResponse,
    GenerationConfig, Part, SafetySetting,
};

/// Failures of a single exchange with the generative-language endpoint.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Key or URL missing. Detected before any network access.
    #[error("{0}")]
    Configuration(String),

    #[error("Kisan-AI API Error: {message}")]
    Transport { status: Option<u16>, message: String },

    #[error("Invalid response format from Gemini API")]
    MalformedResponse,
}

/// One request/response round trip with a text-generation backend.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn get_response(&self, user_input: &str) -> Result<String, GatewayError>;
}

// Client for the Gemini generateContent endpoint
pub struct GeminiClient {
    config: GatewayConfig,
    generation: GenerationConfig,
    safety: Vec<SafetySetting>,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GatewayConfig) -> Self {
        if config.api_key.is_none() || config.api_url.is_none() {
            info!("Gemini credentials not configured; chat requests will be rejected");
        } else {
            info!("Using {} persona for chat prompts", config.persona);
        }

        Self {
            config,
            generation: GenerationConfig::default(),
            safety: default_safety_settings(),
            client: Client::new(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), GatewayError> {
        let key = self.config.api_key.as_deref().ok_or_else(|| {
            GatewayError::Configuration(
                "Missing required GEMINI_API_KEY environment variable".to_string(),
            )
        })?;
        let url = self.config.api_url.as_deref().ok_or_else(|| {
            GatewayError::Configuration(
                "Missing required GEMINI_API_URL environment variable".to_string(),
            )
        })?;
        Ok((key, url))
    }

    /// The single-turn payload sent for `user_input`.
    pub fn request_body(&self, user_input: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: self.config.persona.build(user_input),
                }],
            }],
            generation_config: self.generation,
            safety_settings: self.safety.clone(),
        }
    }
}

#[async_trait]
impl Gateway for GeminiClient {
    async fn get_response(&self, user_input: &str) -> Result<String, GatewayError> {
        let (key, url) = self.credentials()?;
        let payload = self.request_body(user_input);

        info!("Sending chat request ({} characters of user input)", user_input.chars().count());
        debug!("User input: {}", user_input);

        let response = self
            .client
            .post(url)
            .query(&[("key", key)])
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Kisan-AI API request failed: {}", e);
                GatewayError::Transport {
                    status: None,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read Kisan-AI API response: {}", e);
            GatewayError::Transport {
                status: Some(status.as_u16()),
                message: e.to_string(),
            }
        })?;

        if !status.is_success() {
            error!("Kisan-AI API Error: status {}, body {}", status, body);
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| {
                    format!("Request failed with status code {}", status.as_u16())
                });
            return Err(GatewayError::Transport {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Undecodable Kisan-AI API response: {}", e);
            GatewayError::MalformedResponse
        })?;

        let text = parsed.first_text().ok_or_else(|| {
            error!("Kisan-AI API response had no candidate text");
            GatewayError::MalformedResponse
        })?;

        info!("Response length: {} characters", text.len());
        Ok(text.to_string())
    }
}
