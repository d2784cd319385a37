//! Structured YAML persistence for the plugin host.
//!
//! State is kept in small YAML documents whose top level is a mapping keyed
//! by name (plugin name for instance state, config name for bindings). A
//! [`YamlDocument`] reads and writes the whole mapping; a [`YamlSection`]
//! addresses a single key inside it and performs a read-modify-write of the
//! whole document on every change.
//!
//! Writes go through [`write_atomic`], so readers never observe a partially
//! written file. Concurrent writers are last-writer-wins.

mod atomic;
mod document;
mod error;

pub use self::atomic::write_atomic;
pub use self::document::{YamlDocument, YamlSection};
pub use self::error::StoreError;
