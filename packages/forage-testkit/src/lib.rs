mod error;

pub use error::{Error, Result};

use std::{
	collections::HashMap,
	env, fs,
	path::{Path, PathBuf},
	process,
	sync::atomic::{AtomicUsize, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// One turn to write into a test corpus.
#[derive(Debug, Clone)]
pub struct TestTurn {
	pub conversation_id: Value,
	pub speaker_name: String,
	pub content: String,
}
impl TestTurn {
	pub fn new(conversation_id: impl Into<Value>, speaker_name: &str, content: &str) -> Self {
		Self {
			conversation_id: conversation_id.into(),
			speaker_name: speaker_name.to_string(),
			content: content.to_string(),
		}
	}
}

/// Disposable index root holding corpus directories. Removed on drop.
pub struct TempIndexDir {
	root: PathBuf,
}
impl TempIndexDir {
	pub fn new() -> Result<Self> {
		let nanos = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_err(|err| Error::Message(format!("System clock is before the epoch: {err}.")))?
			.as_nanos();
		let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
		let root = env::temp_dir().join(format!("forage_test_{}_{nanos}_{seq}", process::id()));

		fs::create_dir_all(&root)?;

		Ok(Self { root })
	}

	pub fn path(&self) -> &Path {
		&self.root
	}

	pub fn corpus_dir(&self, corpus: &str) -> Result<PathBuf> {
		let dir = self.root.join(corpus);

		fs::create_dir_all(&dir)?;

		Ok(dir)
	}

	/// Writes `snippets.jsonl` with dense ids, per-conversation indexes and 10-second offsets.
	pub fn write_turns(&self, corpus: &str, turns: &[TestTurn]) -> Result<PathBuf> {
		let mut per_conversation: HashMap<String, u32> = HashMap::new();
		let mut lines = Vec::with_capacity(turns.len());

		for (idx, turn) in turns.iter().enumerate() {
			let index_in_conversation =
				per_conversation.entry(turn.conversation_id.to_string()).or_insert(0);
			let record = json!({
				"snippet_index": idx,
				"conversation_id": turn.conversation_id,
				"speaker_name": turn.speaker_name,
				"content": turn.content,
				"index_in_conversation": *index_in_conversation,
				"audio_start_offset": idx as f64 * 10.0,
			});

			*index_in_conversation += 1;

			lines.push(serde_json::to_string(&record)?);
		}

		self.write_lines(corpus, "snippets.jsonl", &lines)
	}

	/// Writes one conversation record per distinct id found in `turns`.
	pub fn write_conversations(
		&self,
		corpus: &str,
		file: &str,
		turns: &[TestTurn],
	) -> Result<PathBuf> {
		let mut seen = Vec::new();

		for turn in turns {
			if !seen.contains(&turn.conversation_id) {
				seen.push(turn.conversation_id.clone());
			}
		}

		let lines = seen
			.iter()
			.map(|id| {
				let title = match id {
					Value::String(text) => format!("Conversation {text}"),
					other => format!("Conversation {other}"),
				};

				serde_json::to_string(&json!({
					"id": id,
					"title": title,
					"start_time": "2021-03-04T18:30:00Z",
					"location": "Boston",
				}))
			})
			.collect::<Result<Vec<_>, _>>()?;

		self.write_lines(corpus, file, &lines)
	}

	pub fn write_lines<S>(&self, corpus: &str, file: &str, lines: &[S]) -> Result<PathBuf>
	where
		S: AsRef<str>,
	{
		let path = self.corpus_dir(corpus)?.join(file);
		let mut body = String::new();

		for line in lines {
			body.push_str(line.as_ref());
			body.push('\n');
		}

		fs::write(&path, body)?;

		Ok(path)
	}
}
impl Drop for TempIndexDir {
	fn drop(&mut self) {
		if let Err(err) = fs::remove_dir_all(&self.root) {
			eprintln!("Test index directory cleanup failed: {err}.");
		}
	}
}

/// Deterministic unit vector derived from the blake3 digest of `text`.
pub fn hash_embedding(text: &str, dim: usize) -> Vec<f32> {
	let mut bytes = vec![0_u8; dim * 4];

	blake3::Hasher::new().update(text.as_bytes()).finalize_xof().fill(&mut bytes);

	let vector: Vec<f32> = bytes
		.chunks_exact(4)
		.map(|chunk| {
			let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);

			raw as f32 / u32::MAX as f32 * 2.0 - 1.0
		})
		.collect();

	normalize(vector)
}

/// `n` seeded random unit vectors of dimension `dim`.
pub fn random_unit_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
	let mut rng = StdRng::seed_from_u64(seed);

	(0..n)
		.map(|_| normalize((0..dim).map(|_| rng.gen_range(-1.0_f32..1.0)).collect()))
		.collect()
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in &mut vector {
			*value /= norm;
		}
	}

	vector
}
