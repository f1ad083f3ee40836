//! Notion remote store
//!
//! The `RemoteStore` trait is the seam the sync engine talks to; `NotionClient`
//! implements it over the public REST API.
//! - Database queries with property filters
//! - Page retrieval
//! - Child block listing, deletion and appending

mod client;
mod models;
mod store;

pub use client::*;
pub use models::*;
pub use store::*;
