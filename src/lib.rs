use std::sync::Arc;

pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod moderation;
pub mod object_store;
pub mod processors;
pub mod store;
pub mod worker;

use object_store::ObjectStore;
use store::TaskStore;

/// Shared state for the HTTP handlers. Workers get their own context; the
/// handlers only ever submit and read tasks.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub object_store: Arc<dyn ObjectStore>,
}
