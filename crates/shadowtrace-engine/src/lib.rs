//! Engine wiring: the `Engine` handle, tool registration trait, config
//! resolution, structured logging, and translation-cache invalidation
//! that tie components A-J together.

pub mod config;
pub mod engine;
pub mod log;
pub mod tool;
pub mod translation_cache;

pub use config::{env_opts_once, parse_opts, LeakResolution, RunConfig};
pub use engine::Engine;
pub use log::{LogLevel, Logger};
pub use tool::{Tool, ToolDetails};
pub use translation_cache::TranslationCache;
