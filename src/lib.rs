//! FreeStream hub client: resolve video links into embeddable player URLs
//! and keep a local view of the hub's stream, schedule and news in sync.

pub mod admin;
pub mod config;
pub mod error;
pub mod events;
pub mod hub;
pub mod logging;
pub mod models;
pub mod remote;
pub mod resolver;
pub mod session;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use hub::Hub;
