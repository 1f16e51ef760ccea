//! AltspaceVR-style world server: per-entity JSON documents on disk, an
//! in-memory area index for search and URL-name lookup, and the HTTP API
//! plus CDN listeners the game client talks to.

pub mod account;
pub mod area_list;
pub mod area_template;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod server;
pub mod storage;
pub mod utils;

pub use crate::bootstrap::{init_defaults, BootstrapReport};
pub use crate::config::ServerConfig;
pub use crate::error::{CoreError, CoreResult};
pub use crate::server::{Server, ServerState};
pub use crate::storage::{FileStorage, SharedStorage, Storage};
