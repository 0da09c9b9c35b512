use std::{cmp::Ordering, collections::HashSet};

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
	Error, Result,
	kmeans::{self, Assignment},
	pq::{CODEBOOK_SIZE, ProductQuantizer},
};

/// Id reported for search slots with no candidate.
pub const EMPTY_ID: i64 = -1;

#[derive(Debug, Clone, Copy)]
pub struct BuildParams {
	pub kmeans_iterations: u32,
	pub min_points_per_centroid: u32,
	pub seed: u64,
}
impl From<&forage_config::Index> for BuildParams {
	fn from(cfg: &forage_config::Index) -> Self {
		Self {
			kmeans_iterations: cfg.kmeans_iterations,
			min_points_per_centroid: cfg.min_points_per_centroid,
			seed: cfg.seed,
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct InvertedList {
	ids: Vec<i64>,
	codes: Vec<u8>,
}

/// Inverted-file index over product-quantized residuals, scored by inner product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfPqIndex {
	dim: usize,
	ntotal: usize,
	coarse: Vec<f32>,
	pq: ProductQuantizer,
	lists: Vec<InvertedList>,
	#[serde(skip, default = "default_nprobe")]
	nprobe: usize,
}
impl IvfPqIndex {
	pub fn build(entries: &[(usize, Vec<f32>)], params: BuildParams) -> Result<Self> {
		let dim = validate_entries(entries)?;
		let n = entries.len();
		let nlist = (n as f64).sqrt().floor() as usize;

		if nlist == 0 {
			return Err(Error::InvalidInput("Coarse cluster count must be positive.".to_string()));
		}

		let per_list = n / nlist;

		if per_list < params.min_points_per_centroid as usize {
			tracing::warn!(
				vectors = n,
				nlist,
				per_list,
				min_points_per_centroid = params.min_points_per_centroid,
				"Too few vectors per coarse centroid. Recall may be degraded."
			);
		}

		let mut rng = StdRng::seed_from_u64(params.seed);
		let data: Vec<f32> =
			entries.iter().flat_map(|(_, vector)| vector.iter().copied()).collect();
		let coarse = kmeans::train(
			&data,
			dim,
			nlist,
			params.kmeans_iterations,
			Assignment::InnerProduct,
			&mut rng,
		);
		let assigned: Vec<usize> = data
			.chunks_exact(dim)
			.map(|vector| kmeans::nearest(vector, &coarse, dim, Assignment::InnerProduct))
			.collect();
		let mut residuals = Vec::with_capacity(data.len());

		for (vector, &list) in data.chunks_exact(dim).zip(&assigned) {
			let centroid = &coarse[list * dim..(list + 1) * dim];

			residuals.extend(vector.iter().zip(centroid).map(|(x, c)| x - c));
		}

		let pq = ProductQuantizer::train(&residuals, dim, params.kmeans_iterations, &mut rng);
		let mut lists = vec![InvertedList::default(); nlist];

		for ((residual, &list), (id, _)) in
			residuals.chunks_exact(dim).zip(&assigned).zip(entries)
		{
			lists[list].ids.push(*id as i64);

			pq.encode_into(residual, &mut lists[list].codes);
		}

		tracing::info!(
			vectors = n,
			dim,
			nlist,
			segments = pq.segments(),
			seed = params.seed,
			"Built IVF-PQ index."
		);

		Ok(Self { dim, ntotal: n, coarse, pq, lists, nprobe: default_nprobe() })
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn ntotal(&self) -> usize {
		self.ntotal
	}

	pub fn nlist(&self) -> usize {
		self.lists.len()
	}

	pub fn nprobe(&self) -> usize {
		self.nprobe
	}

	/// Sets how many inverted lists a search scans. Values of `nlist` or more scan everything.
	pub fn set_nprobe(&mut self, nprobe: usize) {
		self.nprobe = nprobe.max(1);
	}

	/// Returns exactly `k` slots in descending score order, padded with [`EMPTY_ID`] and
	/// negative infinity when fewer candidates exist.
	pub fn search(&self, query: &[f32], k: usize) -> Result<SearchHits> {
		if query.len() != self.dim {
			return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
		}

		let mut probes: Vec<(f32, usize)> = self
			.coarse
			.chunks_exact(self.dim)
			.enumerate()
			.map(|(list, centroid)| (kmeans::dot(query, centroid), list))
			.collect();

		probes.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
		probes.truncate(self.nprobe.min(self.lists.len()));

		let table = self.pq.lookup_table(query);
		let code_size = self.pq.code_size();
		let mut candidates = Vec::new();

		for (base, list) in probes {
			let list = &self.lists[list];

			for (id, codes) in list.ids.iter().zip(list.codes.chunks_exact(code_size)) {
				candidates.push((base + self.pq.score(&table, codes), *id));
			}
		}

		if k > 0 && candidates.len() > k {
			candidates.select_nth_unstable_by(k - 1, by_score_desc);
		}

		candidates.truncate(k);
		candidates.sort_by(by_score_desc);

		let mut hits = SearchHits {
			ids: candidates.iter().map(|(_, id)| *id).collect(),
			scores: candidates.iter().map(|(score, _)| *score).collect(),
		};

		hits.ids.resize(k, EMPTY_ID);
		hits.scores.resize(k, f32::NEG_INFINITY);

		Ok(hits)
	}
}

/// Raw search output: parallel id and score slots.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
	pub ids: Vec<i64>,
	pub scores: Vec<f32>,
}
impl SearchHits {
	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	/// Filled slots as `(turn_id, score)`, skipping the padding sentinel.
	pub fn neighbors(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
		self.ids
			.iter()
			.zip(&self.scores)
			.filter(|(id, _)| **id >= 0)
			.map(|(id, score)| (*id as usize, *score))
	}
}

fn validate_entries(entries: &[(usize, Vec<f32>)]) -> Result<usize> {
	let Some((_, first)) = entries.first() else {
		return Err(Error::InvalidInput("No vectors to index.".to_string()));
	};
	let dim = first.len();

	if dim == 0 || dim % 2 != 0 {
		return Err(Error::InvalidInput(format!(
			"Vector dimension must be a positive even number, got {dim}."
		)));
	}
	if entries.len() < CODEBOOK_SIZE {
		return Err(Error::InvalidInput(format!(
			"At least {CODEBOOK_SIZE} vectors are required, got {}.",
			entries.len()
		)));
	}

	let mut seen = HashSet::with_capacity(entries.len());

	for (id, vector) in entries {
		if vector.len() != dim {
			return Err(Error::InvalidInput(format!(
				"Vector {id} has dimension {}, expected {dim}.",
				vector.len()
			)));
		}
		if !seen.insert(*id) {
			return Err(Error::InvalidInput(format!("Duplicate vector id {id}.")));
		}
	}

	Ok(dim)
}

fn by_score_desc(a: &(f32, i64), b: &(f32, i64)) -> Ordering {
	b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
}

fn default_nprobe() -> usize {
	1
}
