// tagwatch-api: Async Rust client for the inventory/product backend

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::InventoryClient;
pub use error::Error;
pub use models::{ItemResponse, ProductResponse};
pub use transport::{TlsMode, TransportConfig};
