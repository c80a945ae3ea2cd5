use std::sync::Arc;

use crate::{configs::Config, server::SessionRegistry};

/// Top-level application state shared by every route.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
}
