//! Theme styles for enriching card art prompts
//!
//! A theme style fixes the visual vocabulary (art direction, palette, things to
//! avoid) shared by every card of a set so the generated artwork stays
//! consistent.

use cardforge_core::{CardForgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A theme style loaded from `<name>.style.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemeStyle {
    /// Style name (e.g. "dark_fantasy")
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Prepended to every prompt
    #[serde(default)]
    pub prompt_prefix: Option<String>,
    /// Appended to every prompt
    #[serde(default)]
    pub prompt_suffix: Option<String>,
    /// Things to avoid
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Color palette as hex strings
    #[serde(default)]
    pub palette: Vec<String>,
    /// Extra direction per rarity, e.g. `legendary = "golden glow"`
    #[serde(default)]
    pub rarity_accents: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StyleFile {
    style: ThemeStyle,
}

impl ThemeStyle {
    /// Load a theme style from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: StyleFile = toml::from_str(&content).map_err(|e| {
            CardForgeError::StyleError(format!("Failed to parse style {}: {}", path.display(), e))
        })?;
        Ok(file.style)
    }

    /// Find and load a style by name, searching `styles/` then `.cardforge/styles/`
    pub fn find(name: &str) -> Result<Self> {
        Self::find_in(Path::new("."), name)
    }

    /// Like [`ThemeStyle::find`] but relative to `root`
    pub fn find_in(root: &Path, name: &str) -> Result<Self> {
        let candidates = [
            root.join("styles").join(format!("{}.style.toml", name)),
            root.join(".cardforge").join("styles").join(format!("{}.style.toml", name)),
        ];

        for candidate in &candidates {
            if candidate.is_file() {
                return Self::load(candidate);
            }
        }

        Err(CardForgeError::StyleError(format!(
            "Style '{}' not found (searched: {})",
            name,
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Wrap a card prompt in the style's direction
    pub fn enrich_prompt(&self, base_prompt: &str, rarity: Option<&str>) -> String {
        let mut parts = Vec::new();

        if let Some(ref prefix) = self.prompt_prefix {
            parts.push(prefix.clone());
        }

        parts.push(base_prompt.to_string());

        if let Some(accent) = rarity.and_then(|r| self.rarity_accents.get(r)) {
            parts.push(accent.clone());
        }

        if !self.palette.is_empty() {
            parts.push(format!("Color palette: {}", self.palette.join(", ")));
        }

        if let Some(ref suffix) = self.prompt_suffix {
            parts.push(suffix.clone());
        }

        parts.join(". ")
    }

    pub fn negative(&self) -> Option<&str> {
        self.negative_prompt.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cardforge_style_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_style() {
        let dir = temp_dir();
        let styles = dir.join("styles");
        std::fs::create_dir_all(&styles).unwrap();
        std::fs::write(
            styles.join("dark_fantasy.style.toml"),
            r##"
[style]
name = "dark_fantasy"
prompt_prefix = "Dark fantasy trading card illustration"
prompt_suffix = "painterly, dramatic rim light"
negative_prompt = "text, watermark, border"
palette = ["#1B1B2F", "#C0A060"]

[style.rarity_accents]
legendary = "radiant golden aura"
"##,
        )
        .unwrap();

        let style = ThemeStyle::find_in(&dir, "dark_fantasy").unwrap();
        assert_eq!(style.name, "dark_fantasy");
        assert_eq!(style.palette.len(), 2);
        assert_eq!(style.negative(), Some("text, watermark, border"));
        assert_eq!(
            style.rarity_accents.get("legendary").map(String::as_str),
            Some("radiant golden aura")
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_enrich_prompt() {
        let style = ThemeStyle {
            name: "test".to_string(),
            prompt_prefix: Some("Fantasy card art".to_string()),
            prompt_suffix: Some("high detail".to_string()),
            palette: vec!["#8B4513".to_string()],
            rarity_accents: [("rare".to_string(), "blue sparks".to_string())]
                .into_iter()
                .collect(),
            ..ThemeStyle::default()
        };

        let enriched = style.enrich_prompt("a fire imp", Some("rare"));
        assert_eq!(
            enriched,
            "Fantasy card art. a fire imp. blue sparks. Color palette: #8B4513. high detail"
        );
        assert!(!style.enrich_prompt("a fire imp", Some("common")).contains("sparks"));
    }

    #[test]
    fn test_minimal_style_is_passthrough() {
        let style = ThemeStyle::default();
        assert_eq!(style.enrich_prompt("simple", None), "simple");
    }

    #[test]
    fn test_style_not_found() {
        let dir = temp_dir();
        let err = ThemeStyle::find_in(&dir, "nonexistent_style_xyz").unwrap_err();
        assert!(matches!(err, CardForgeError::StyleError(_)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
