use std::sync::Arc;

use expander_core::{Expander, SpotifyApi};

/// Shared, read-only handles for the request handlers. Constructed once at
/// startup; individual requests never mutate it.
#[derive(Clone)]
pub struct AppState {
    pub api: SpotifyApi,
    pub expander: Arc<Expander<SpotifyApi>>,
}

impl AppState {
    pub fn new(api: SpotifyApi) -> Self {
        Self {
            expander: Arc::new(Expander::new(api.clone())),
            api,
        }
    }
}
