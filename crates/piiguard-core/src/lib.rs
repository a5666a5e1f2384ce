//! PiiGuard Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout PiiGuard:
//! - Entity label canonicalization
//! - Guard type / field definition / regex pattern configuration model
//! - Configuration store and LLM client trait abstractions
//! - Core error types

pub mod config_store;
pub mod entity;
pub mod error;
pub mod guard;
pub mod llm;

pub use config_store::{GuardConfigStore, GuardSnapshot};
pub use error::{Error, Result};
pub use guard::{DetectionMode, FieldDefinition, GuardType, RegexPattern, RowId};
