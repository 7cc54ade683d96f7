//! Card definitions and prompt synthesis

use crate::style::ThemeStyle;
use serde::{Deserialize, Serialize};

/// The content fields of a card that artwork is generated for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CardDefinition {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            rarity: None,
            description: None,
            tags: Vec::new(),
        }
    }
}

/// Positive and negative prompt for one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub prompt: String,
    pub negative_prompt: Option<String>,
}

/// Turns a card definition into prompt text
pub trait PromptBuilder: Send + Sync {
    fn build(&self, card: &CardDefinition, theme: &str) -> PromptPair;
}

/// Prompt builder that describes the card and applies an optional theme style
#[derive(Debug, Clone, Default)]
pub struct StylePromptBuilder {
    style: Option<ThemeStyle>,
}

impl StylePromptBuilder {
    pub fn new(style: Option<ThemeStyle>) -> Self {
        Self { style }
    }
}

impl PromptBuilder for StylePromptBuilder {
    fn build(&self, card: &CardDefinition, theme: &str) -> PromptPair {
        let mut subject = format!("{} card artwork of {}", theme, card.name);
        if let Some(ref description) = card.description {
            subject.push_str(", ");
            subject.push_str(description);
        }
        if !card.tags.is_empty() {
            subject.push_str(&format!(" ({})", card.tags.join(", ")));
        }

        match &self.style {
            Some(style) => PromptPair {
                prompt: style.enrich_prompt(&subject, card.rarity.as_deref()),
                negative_prompt: style.negative().map(str::to_string),
            },
            None => PromptPair {
                prompt: subject,
                negative_prompt: None,
            },
        }
    }
}
