//! stash-core - Core library for Stash
//!
//! This crate contains the models, the local entity store, and the offline-first
//! sync engine shared by all Stash interfaces. Reads go through [`merge::MergeView`],
//! pushes go through [`sync::SyncCoordinator`], and local mutations arm the
//! [`sync::AutoSyncScheduler`].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod merge;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{EntityId, Folder, Snippet};
