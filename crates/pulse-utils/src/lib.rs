//! Shared utilities for market-pulse
//!
//! This crate provides common functionality used across the market-pulse workspace,
//! including logging setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError, EnvLookup, LogFormat};
pub use logging::{init_tracing, init_tracing_with};
