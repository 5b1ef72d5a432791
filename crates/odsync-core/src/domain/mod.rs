//! Domain entities and business logic
//!
//! This module contains the core domain types for the synchronizer:
//! - Newtypes for type-safe identifiers and validated remote tokens
//! - The canonical item record and path-derivation logic
//! - The remote item classifier
//! - Domain and sync error types

pub mod classify;
pub mod errors;
pub mod item;
pub mod newtypes;

pub use classify::{classify, Classification, RawRemoteItem};
pub use errors::{DomainError, SyncError};
pub use item::{derive_path, ItemRecord, ItemType};
pub use newtypes::{CTag, Crc32Hex, DeltaToken, ETag, RemoteId, RemotePath, SyncPath};
