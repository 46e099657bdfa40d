//! deploybot-state — who is deploying where.
//!
//! Tracks, per channel, the single deployment currently in progress.
//! Records live in a [`DeployStore`] (redb on disk, or a plain map in
//! memory) and [`ChannelDeploys`] applies the exclusivity rule on top:
//! one active deployment per channel, an operator may supersede their
//! own, anyone else is turned away with the existing record.
//!
//! # Architecture
//!
//! Deployment records are JSON-serialized into redb's `&[u8]` value
//! column, keyed by the channel identifier. The coordinator serializes
//! `start`/`finish` per channel through [`ChannelLocks`], so the
//! read-check-write sequence is atomic with respect to other callers in
//! the same process.

pub mod coordinator;
pub mod error;
pub mod locks;
pub mod memory;
pub mod store;
pub mod tables;
pub mod types;

pub use coordinator::ChannelDeploys;
pub use error::{StateError, StateResult};
pub use locks::ChannelLocks;
pub use memory::MemoryStore;
pub use store::{DeployStore, RedbStore};
pub use types::*;
