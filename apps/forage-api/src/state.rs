use std::sync::Arc;

use forage_service::{ForageService, Providers};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ForageService>,
}
impl AppState {
	/// Loads every corpus with the HTTP-backed providers. Corpora that fail to load are served
	/// as unavailable.
	pub fn new(config: forage_config::Config) -> Self {
		Self::with_service(ForageService::load(config, Providers::default()))
	}

	pub fn with_service(service: ForageService) -> Self {
		Self { service: Arc::new(service) }
	}
}
