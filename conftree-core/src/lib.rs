//! In-memory hierarchical configuration store: a nested, dotted-key
//! namespace with parent/child inheritance and an explicit lock transition
//! from "being defined" to "immutable and queryable".

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConfigSnapshot, Configuration, Cursor, KeyPath, ParentSpec, Registry, Resolved};
pub use error::{Error, Result};
