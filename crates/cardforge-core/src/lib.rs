//! CardForge Core - Foundational types for the card art pipeline
//!
//! This crate provides the types every other CardForge crate depends on:
//! - `ContentHash` - SHA-256 based content hashing of generated artwork
//! - Error types and Result alias

mod error;
mod hash;

pub use error::{CardForgeError, Result};
pub use hash::ContentHash;
