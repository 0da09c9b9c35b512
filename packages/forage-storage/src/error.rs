use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("I/O error at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("Malformed record at {path}:{line}: {source}")]
	Record {
		path: PathBuf,
		line: usize,
		#[source]
		source: serde_json::Error,
	},
	#[error("Invalid corpus {corpus}: {message}")]
	InvalidCorpus { corpus: String, message: String },
	#[error("Invalid index input: {0}")]
	InvalidInput(String),
	#[error("Dimension mismatch: index expects {expected}, got {actual}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Invalid index artifact at {path}: {message}")]
	InvalidArtifact { path: PathBuf, message: String },
	#[error(transparent)]
	Bincode(#[from] bincode::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
}

pub(crate) fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> Error {
	move |source| Error::Io { path: path.to_path_buf(), source }
}
