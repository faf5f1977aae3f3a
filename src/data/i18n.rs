use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{read_json, DataError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Mr,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Hi, Language::Mr];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Mr => "mr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported language: {}", s))
    }
}

/// Per-language UI string tables.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    tables: HashMap<Language, Value>,
}

impl Translations {
    /// Loads `<dir>/<code>.json` for every language. English is required;
    /// other languages are skipped with a warning when they fail to load.
    pub fn load(dir: &Path) -> Result<Self, DataError> {
        let mut tables = HashMap::new();
        for lang in Language::ALL {
            let path = dir.join(format!("{}.json", lang.code()));
            match read_json::<Value>(&path) {
                Ok(table) => {
                    tables.insert(lang, table);
                }
                Err(e) if lang != Language::En => warn!("Failed to load translations: {}", e),
                Err(e) => return Err(e),
            }
        }
        info!("Loaded translations for {} languages", tables.len());
        Ok(Self { tables })
    }

    pub fn from_tables(tables: HashMap<Language, Value>) -> Self {
        Self { tables }
    }

    /// The table for `lang`, or English when that language is unavailable.
    pub fn table(&self, lang: Language) -> Option<&Value> {
        self.tables
            .get(&lang)
            .or_else(|| self.tables.get(&Language::En))
    }

    /// Resolves a dot-separated key path. Unresolved paths return the key.
    pub fn t<'a>(&'a self, lang: Language, key: &'a str) -> &'a str {
        let Some(mut value) = self.table(lang) else {
            return key;
        };
        for segment in key.split('.') {
            match value.get(segment) {
                Some(next) => value = next,
                None => return key,
            }
        }
        match value.as_str() {
            Some(text) if !text.is_empty() => text,
            _ => key,
        }
    }
}
