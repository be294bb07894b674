//! Configuration Module
//!
//! Configuration loading for the whisperer service.

mod settings;

pub use settings::{
    AnimationSettings, ConfigError, DEFAULT_CHAIN, DEFAULT_TOKEN_ADDRESS, FeedSource,
    NarrationSettings, ServerSettings, WhispererConfig,
};
