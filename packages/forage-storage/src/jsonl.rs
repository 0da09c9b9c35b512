use std::{
	fs::File,
	io::{BufRead, BufReader, Write},
	path::Path,
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result, artifact, error::io_at};

/// Reads one record per non-blank line. The first malformed line aborts the read.
pub fn read_records<T>(path: &Path) -> Result<Vec<T>>
where
	T: DeserializeOwned,
{
	let file = File::open(path).map_err(io_at(path))?;
	let mut records = Vec::new();

	for (idx, line) in BufReader::new(file).lines().enumerate() {
		let line = line.map_err(io_at(path))?;

		if line.trim().is_empty() {
			continue;
		}

		let record = serde_json::from_str(&line).map_err(|source| Error::Record {
			path: path.to_path_buf(),
			line: idx + 1,
			source,
		})?;

		records.push(record);
	}

	Ok(records)
}

pub fn write_records<'a, T, I>(path: &Path, records: I) -> Result<usize>
where
	T: 'a + Serialize,
	I: IntoIterator<Item = &'a T>,
{
	let mut written = 0;

	artifact::write_atomic(path, |out| {
		for record in records {
			serde_json::to_writer(&mut *out, record)?;

			out.write_all(b"\n").map_err(io_at(path))?;

			written += 1;
		}

		Ok(())
	})?;

	Ok(written)
}
