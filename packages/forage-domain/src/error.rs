pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unknown scope {raw:?}. Expected search_only, top_N, top_N_with_bio, or top_N_with_context_W.")]
	InvalidScope { raw: String },
	#[error("Template {template:?} must contain exactly one %s placeholder.")]
	InvalidTemplate { template: String },
}
