//! File-based configuration store for PiiGuard
//!
//! This crate implements the `GuardConfigStore` trait over an in-memory table
//! set that is optionally persisted to a YAML or TOML file on disk.
//!
//! # Features
//! - In-memory store for tests and ephemeral deployments
//! - File persistence rewritten atomically after every mutation
//! - YAML and TOML formats (chosen by file extension)
//! - Idempotent seeding of the default guard types and patterns
//!
//! # Example
//! ```no_run
//! # use piiguard_config_file::{FileConfigStore, seed_defaults};
//! # use piiguard_core::GuardConfigStore;
//! # async fn example() -> piiguard_core::Result<()> {
//! let store = FileConfigStore::open("~/.piiguard/guards.yaml").await?;
//! seed_defaults(&store).await?;
//! let fields = store.list_active_fields_for("InfoPerso").await?;
//! # Ok(())
//! # }
//! ```

mod file_store;
mod seed;

pub use file_store::FileConfigStore;
pub use seed::{
    seed_defaults, FieldSeed, GuardSeed, PatternSeed, SeedReport, DEFAULT_GUARDS, DEFAULT_PATTERNS,
};
