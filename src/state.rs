use crate::{config::Config, services::VisibilityService, store::VisibilityStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VisibilityStore>,
    pub visibility: Arc<VisibilityService>,
    pub config: Arc<Config>,
}
