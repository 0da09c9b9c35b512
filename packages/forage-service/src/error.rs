pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Unknown corpus: {corpus}.")]
	UnknownCorpus { corpus: String },
	#[error("Corpus {corpus} is unavailable: {message}")]
	CorpusUnavailable { corpus: String, message: String },
	#[error("Query vector has dimension {actual}, index expects {expected}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Prompt too long: {message}")]
	PromptTooLong { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<forage_providers::Error> for Error {
	fn from(err: forage_providers::Error) -> Self {
		match err {
			forage_providers::Error::ContextLengthExceeded { message } => {
				Self::PromptTooLong { message }
			},
			other => Self::Provider { message: other.to_string() },
		}
	}
}

impl From<forage_storage::Error> for Error {
	fn from(err: forage_storage::Error) -> Self {
		match err {
			forage_storage::Error::DimensionMismatch { expected, actual } => {
				Self::DimensionMismatch { expected, actual }
			},
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<forage_domain::Error> for Error {
	fn from(err: forage_domain::Error) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
