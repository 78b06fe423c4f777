use std::sync::Arc;

use ephemera_core::RecordStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn RecordStore>,
    pub jwt_secret: String,
    /// Prefix for share links handed back on create, e.g. `https://ephemera.example`.
    pub public_base_url: String,
}

impl AppStateInner {
    pub fn share_url(&self, id: uuid::Uuid) -> String {
        format!("{}/view/{}", self.public_base_url.trim_end_matches('/'), id)
    }
}
