use std::sync::Arc;

use crate::db::DbPool;
use crate::session::registry::Registry;

/// Shared application state handed to every session actor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Live nickname -> session map
    pub registry: Arc<Registry>,
}
