//! Personality profiles and the immutable registry that holds them.
//!
//! A registry is built once at process start, either from the built-in
//! profiles or from a TOML file, and is only read afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, StoryError};

/// A named voice: style label, prompt directive, credential env keys and
/// optional feed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    pub id: String,
    pub style: String,
    pub prompt_modifier: String,
    pub env_user_key: String,
    pub env_pass_key: String,
    /// Feed URLs to read. `None` means the aggregator's default list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeds: Option<Vec<String>>,
}

impl Personality {
    fn builtin(id: &str, style: &str, prompt_modifier: &str) -> Self {
        let upper = id.to_ascii_uppercase();
        Self {
            id: id.to_string(),
            style: style.to_string(),
            prompt_modifier: prompt_modifier.to_string(),
            env_user_key: format!("WP_USER_{upper}"),
            env_pass_key: format!("WP_PASS_{upper}"),
            feeds: None,
        }
    }

    /// Feed URLs for this personality, empty when it uses the defaults.
    pub fn feed_urls(&self) -> &[String] {
        self.feeds.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "personality")]
    personalities: Vec<Personality>,
}

/// Read-only lookup table from identifier to [`Personality`].
#[derive(Debug, Clone)]
pub struct PersonalityRegistry {
    entries: BTreeMap<String, Personality>,
}

impl PersonalityRegistry {
    /// The five profiles the program ships with.
    pub fn builtin() -> Self {
        let profiles = [
            Personality::builtin(
                "alice",
                "compassionate",
                "Add a style of compassion to the story. Focus on the human element, empathy, and emotional connection. Be kind and understanding in the tone.",
            ),
            Personality::builtin(
                "wallace",
                "analytical",
                "Add a very detailed analysis to the story. Break down the events, causes, and effects with rigorous logic. Use data-driven language where appropriate and be extremely precise.",
            ),
            Personality::builtin(
                "mike",
                "financial",
                "Focus heavily on financial implications and markets. Discuss stocks, bonds, economic indicators, and how this news affects the bottom line for businesses and investors.",
            ),
            Personality::builtin(
                "mindy",
                "economist",
                "Adopt the persona of an economist. Focus on global stability, conflict, and trade. Discuss macroeconomic trends, geopolitical ramifications, and long-term societal impact.",
            ),
            Personality::builtin(
                "derick",
                "conspiracy",
                "Add a style of conspiracy and intrigue. Shade the story in dark tones, questioning official narratives and suggesting hidden agendas. Connect events to a grander, more sinister theory.",
            ),
        ];
        Self {
            entries: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Parse a registry from TOML text with one `[[personality]]` table per profile.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(text)
            .map_err(|e| StoryError::ConfigError(format!("invalid personalities file: {e}")))?;
        if file.personalities.is_empty() {
            return Err(StoryError::ConfigError(
                "personalities file defines no [[personality]] entries".into(),
            ));
        }

        let mut entries = BTreeMap::new();
        for p in file.personalities {
            if p.id.trim().is_empty() {
                return Err(StoryError::ConfigError(
                    "personality entry with empty id".into(),
                ));
            }
            if entries.contains_key(&p.id) {
                return Err(StoryError::ConfigError(format!(
                    "duplicate personality id '{}'",
                    p.id
                )));
            }
            entries.insert(p.id.clone(), p);
        }
        tracing::debug!(count = entries.len(), "Loaded personality registry");
        Ok(Self { entries })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoryError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, id: &str) -> Result<&Personality> {
        self.entries
            .get(id)
            .ok_or_else(|| StoryError::UnknownPersonality(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Personality> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PersonalityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
