//! Shared types, error model, and configuration for chronomark.
//!
//! This crate is the foundation depended on by all other chronomark crates.
//! It provides:
//! - [`ChronoError`], the unified error type
//! - Domain types ([`HistoryEvent`], [`Fragment`], [`MatchMethod`], [`Diagnostics`])
//! - Configuration ([`AppConfig`], [`MatchConfig`], [`RenderConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DuplicatePolicy, HistoryConfig, MatchConfig, MatchingConfig, OutputConfig,
    RenderConfig, config_dir, config_file_path, init_config, init_config_in, load_config,
    load_config_from,
};
pub use error::{ChronoError, Result};
pub use types::{
    Diagnostics, Fragment, FragmentKind, HistoryEvent, MatchMethod, SectionHeading, SectionPath,
    UnresolvedFragment,
};
