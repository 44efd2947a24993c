//! taproot: a hierarchical task store with pomodoro time tracking.
//!
//! Tasks form a per-owner forest addressed by materialized paths
//! (`"1.2.3"`). The store keeps three guarantees: a task's path always
//! reflects its current ancestor chain, soft deletes and restores cascade
//! consistently to descendants and session associations, and every mutation
//! leaves an immutable audit entry.

pub mod cascade;
pub mod commands;
pub mod db;
pub mod error;
pub mod history;
pub mod models;
pub mod path;
pub mod store;

pub use error::StoreError;
pub use store::TaskStore;
