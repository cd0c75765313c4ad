//! Shared types, error model, and configuration for pagebot.
//!
//! This crate is the foundation depended on by all other pagebot crates.
//! It provides:
//! - [`PageBotError`], the unified error type
//! - Domain types ([`Document`], [`TableKind`], [`AlbumPage`], [`RunId`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, Credentials, ProducerPagesConfig, RunConfig, RunSection, WikiConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
    validate_credentials,
};
pub use error::{PageBotError, Result};
pub use types::{AlbumPage, Document, LinkedPages, RunId, SaveFlags, TableKind};
