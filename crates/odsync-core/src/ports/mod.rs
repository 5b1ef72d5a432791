//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces the engine depends on, but
//! whose implementations live in adapter crates.
//!
//! ## Ports overview
//!
//! - [`RemotePort`] — remote API operations (list delta, download, upload,
//!   patch, delete, create folder).
//! - [`IndexPort`] — the persistent index and delta cursor.
//! - [`LocalFsPort`] — local filesystem operations and change events.

pub mod index;
pub mod local_fs;
pub mod remote;

pub use index::IndexPort;
pub use local_fs::{ChangeEvent, LocalFsPort, LocalState, WatchHandle};
pub use remote::{DeltaPage, MutationResult, RemotePort};
