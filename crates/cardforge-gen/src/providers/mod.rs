//! Provider registry
//!
//! Maps provider names to concrete implementations.

pub mod mock;

use crate::provider::ImageProvider;
use cardforge_core::{CardForgeError, Result};
use std::sync::Arc;

/// Create a provider by name
pub fn create_provider(name: &str) -> Result<Arc<dyn ImageProvider>> {
    match name {
        "mock" => Ok(Arc::new(mock::MockProvider::new())),
        _ => Err(CardForgeError::ProviderError(format!(
            "Unknown provider '{}'. Available: {}",
            name,
            available_providers().join(", ")
        ))),
    }
}

/// List all available provider names
pub fn available_providers() -> Vec<&'static str> {
    vec!["mock"]
}
