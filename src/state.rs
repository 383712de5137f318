use std::sync::Arc;

use crate::session::SessionManager;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    /// Shared secret every control route checks against `x-api-key`.
    pub api_key: String,
    pub session: Arc<SessionManager>,
}

impl AppState {
    pub fn new(api_key: String, session: Arc<SessionManager>) -> SharedState {
        Arc::new(Self { api_key, session })
    }
}
