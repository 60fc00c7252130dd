use crate::config::AppConfig;
use crate::dedup::DedupStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: DedupStore,
}
