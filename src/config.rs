use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::model::prompt::Persona;

pub const DEFAULT_CHARACTER_LIMIT: usize = 50;
pub const DEFAULT_COOLDOWN_SECS: u64 = 30;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1800;

/// Settings for the outbound generative-language exchange.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub persona: Persona,
}

/// Per-session chat guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    pub character_limit: usize,
    pub cooldown: Duration,
    /// Idle time after which a session may be evicted.
    pub session_ttl: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            character_limit: DEFAULT_CHARACTER_LIMIT,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub chat: ChatSettings,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values are treated the same as unset ones
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let persona = match non_empty("KISAN_PROMPT_PERSONA") {
            Some(raw) => raw.parse::<Persona>().unwrap_or_else(|_| {
                warn!("Unknown KISAN_PROMPT_PERSONA '{}', using assistant", raw);
                Persona::default()
            }),
            None => Persona::default(),
        };

        let character_limit = parse_or(&non_empty, "CHAT_CHARACTER_LIMIT", DEFAULT_CHARACTER_LIMIT);
        let cooldown_secs = parse_or(&non_empty, "CHAT_COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS);
        let session_ttl_secs =
            parse_or(&non_empty, "CHAT_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS);

        Self {
            gateway: GatewayConfig {
                api_key: non_empty("GEMINI_API_KEY"),
                api_url: non_empty("GEMINI_API_URL"),
                persona,
            },
            chat: ChatSettings {
                character_limit,
                cooldown: Duration::from_secs(cooldown_secs),
                session_ttl: Duration::from_secs(session_ttl_secs),
            },
            host: non_empty("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&non_empty, "PORT", 8080),
            data_dir: non_empty("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
        }
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for {}, using {}", raw, name, default);
            default
        }),
        None => default,
    }
}
