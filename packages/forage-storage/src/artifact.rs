use std::{
	fs::{self, File},
	io::{BufWriter, Write},
	path::{Path, PathBuf},
	process,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use forage_config::EmbeddingSource;

use crate::{Error, Result, error::io_at, ivf::IvfPqIndex};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
	pub format_version: u32,
	pub corpus: String,
	pub source: EmbeddingSource,
	pub dim: u32,
	pub ntotal: u64,
	/// Hex blake3 digest of the encoded index that follows the header.
	pub digest: String,
	pub built_at: OffsetDateTime,
}

pub fn corpus_dir(index_dir: &Path, corpus: &str) -> PathBuf {
	index_dir.join(corpus)
}

pub fn index_path(index_dir: &Path, corpus: &str, source: EmbeddingSource) -> PathBuf {
	corpus_dir(index_dir, corpus).join(format!("forage_{source}.ivfpq"))
}

/// Persists `index` for `(corpus, source)`, replacing any previous artifact atomically.
pub fn write_index(
	index_dir: &Path,
	corpus: &str,
	source: EmbeddingSource,
	index: &IvfPqIndex,
) -> Result<ArtifactHeader> {
	let path = index_path(index_dir, corpus, source);
	let body = bincode::serialize(index)?;
	let header = ArtifactHeader {
		format_version: FORMAT_VERSION,
		corpus: corpus.to_string(),
		source,
		dim: index.dim() as u32,
		ntotal: index.ntotal() as u64,
		digest: blake3::hash(&body).to_hex().to_string(),
		built_at: OffsetDateTime::now_utc(),
	};

	write_atomic(&path, |out| {
		bincode::serialize_into(&mut *out, &header)?;

		out.write_all(&body).map_err(io_at(&path))
	})?;

	tracing::info!(
		path = %path.display(),
		corpus,
		source = %source,
		vectors = header.ntotal,
		bytes = body.len(),
		"Persisted index artifact."
	);

	Ok(header)
}

/// Loads and verifies the artifact for `(corpus, source)`, then applies `nprobe`.
pub fn read_index(
	index_dir: &Path,
	corpus: &str,
	source: EmbeddingSource,
	nprobe: usize,
) -> Result<(ArtifactHeader, IvfPqIndex)> {
	let path = index_path(index_dir, corpus, source);
	let bytes = fs::read(&path).map_err(io_at(&path))?;
	let invalid = |message: String| Error::InvalidArtifact { path: path.clone(), message };
	let mut cursor = bytes.as_slice();
	let header: ArtifactHeader = bincode::deserialize_from(&mut cursor)
		.map_err(|err| invalid(format!("Unreadable header: {err}.")))?;

	if header.format_version != FORMAT_VERSION {
		return Err(invalid(format!(
			"Unsupported format version {}, expected {FORMAT_VERSION}.",
			header.format_version
		)));
	}
	if header.corpus != corpus || header.source != source {
		return Err(invalid(format!(
			"Artifact belongs to {}/{}, expected {corpus}/{source}.",
			header.corpus, header.source
		)));
	}

	let digest = blake3::hash(cursor).to_hex().to_string();

	if digest != header.digest {
		return Err(invalid("Digest mismatch.".to_string()));
	}

	let mut index: IvfPqIndex = bincode::deserialize(cursor)
		.map_err(|err| invalid(format!("Unreadable index body: {err}.")))?;

	if index.dim() != header.dim as usize || index.ntotal() as u64 != header.ntotal {
		return Err(invalid("Header does not describe the stored index.".to_string()));
	}

	index.set_nprobe(nprobe);

	tracing::info!(
		path = %path.display(),
		corpus,
		source = %source,
		vectors = header.ntotal,
		nlist = index.nlist(),
		nprobe = index.nprobe(),
		"Loaded index artifact."
	);

	Ok((header, index))
}

/// Writes through a sibling temporary file and renames it over `path`.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
	F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).map_err(io_at(parent))?;
	}

	let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("artifact");
	let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", process::id()));
	let result = write_then_sync(&tmp, write);

	if let Err(err) = result {
		let _ = fs::remove_file(&tmp);

		return Err(err);
	}

	fs::rename(&tmp, path).map_err(io_at(path))
}

fn write_then_sync<F>(tmp: &Path, write: F) -> Result<()>
where
	F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
	let file = File::create(tmp).map_err(io_at(tmp))?;
	let mut out = BufWriter::new(file);

	write(&mut out)?;

	let file = out.into_inner().map_err(|err| Error::Io {
		path: tmp.to_path_buf(),
		source: err.into_error(),
	})?;

	file.sync_all().map_err(io_at(tmp))
}
