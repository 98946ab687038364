//! Hosted completion providers

pub mod gemini;

pub use gemini::{GeminiConfig, GeminiProvider};
