use rand::{Rng, seq::index};

/// Training points sampled per centroid at most.
pub const MAX_POINTS_PER_CENTROID: usize = 256;

const SPLIT_EPS: f32 = 1.0 / 1_024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
	/// Nearest centroid by squared Euclidean distance.
	L2,
	/// Centroid with the largest inner product.
	InnerProduct,
}

/// Lloyd's k-means over row-major `data` (`dim` floats per point).
///
/// Centroids start at a random sample of distinct points. Clusters left empty after an update
/// take over half of the largest cluster by splitting its centroid with a small perturbation.
/// At most `MAX_POINTS_PER_CENTROID * k` points are used for training. The caller guarantees
/// `k` does not exceed the point count.
pub fn train<R>(
	data: &[f32],
	dim: usize,
	k: usize,
	iterations: u32,
	assignment: Assignment,
	rng: &mut R,
) -> Vec<f32>
where
	R: Rng + ?Sized,
{
	let n = data.len() / dim;
	let sample = subsample(data, dim, k, rng);
	let points = sample.as_deref().unwrap_or(data);
	let n_train = points.len() / dim;
	let mut centroids = Vec::with_capacity(k * dim);

	for idx in index::sample(rng, n_train, k) {
		centroids.extend_from_slice(&points[idx * dim..(idx + 1) * dim]);
	}

	let mut assign = vec![0_usize; n_train];

	for iteration in 0..iterations {
		let mut changed = 0;

		for (point_idx, point) in points.chunks_exact(dim).enumerate() {
			let best = nearest(point, &centroids, dim, assignment);

			if iteration == 0 || assign[point_idx] != best {
				changed += 1;
			}

			assign[point_idx] = best;
		}

		let mut counts = update_centroids(points, &assign, &mut centroids, dim, k);

		split_empty_clusters(&mut centroids, &mut counts, dim, rng);

		if iteration > 0 && changed == 0 {
			break;
		}
	}

	tracing::trace!(n, n_train, k, dim, "Trained k-means codebook.");

	centroids
}

pub fn nearest(point: &[f32], centroids: &[f32], dim: usize, assignment: Assignment) -> usize {
	let mut best = 0;
	let mut best_score = f32::NEG_INFINITY;

	for (idx, centroid) in centroids.chunks_exact(dim).enumerate() {
		let score = match assignment {
			Assignment::L2 => -squared_l2(point, centroid),
			Assignment::InnerProduct => dot(point, centroid),
		};

		if score > best_score {
			best = idx;
			best_score = score;
		}
	}

	best
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn subsample<R>(data: &[f32], dim: usize, k: usize, rng: &mut R) -> Option<Vec<f32>>
where
	R: Rng + ?Sized,
{
	let n = data.len() / dim;
	let cap = MAX_POINTS_PER_CENTROID * k;

	if n <= cap {
		return None;
	}

	let mut picked = index::sample(rng, n, cap).into_vec();

	picked.sort_unstable();

	let mut sample = Vec::with_capacity(cap * dim);

	for idx in picked {
		sample.extend_from_slice(&data[idx * dim..(idx + 1) * dim]);
	}

	Some(sample)
}

fn update_centroids(
	points: &[f32],
	assign: &[usize],
	centroids: &mut [f32],
	dim: usize,
	k: usize,
) -> Vec<usize> {
	let mut sums = vec![0.0_f64; k * dim];
	let mut counts = vec![0_usize; k];

	for (point, &cluster) in points.chunks_exact(dim).zip(assign) {
		counts[cluster] += 1;

		for (sum, value) in sums[cluster * dim..(cluster + 1) * dim].iter_mut().zip(point) {
			*sum += *value as f64;
		}
	}

	for cluster in 0..k {
		if counts[cluster] == 0 {
			continue;
		}

		let count = counts[cluster] as f64;

		for d in 0..dim {
			centroids[cluster * dim + d] = (sums[cluster * dim + d] / count) as f32;
		}
	}

	counts
}

fn split_empty_clusters<R>(centroids: &mut [f32], counts: &mut [usize], dim: usize, rng: &mut R)
where
	R: Rng + ?Sized,
{
	let k = counts.len();

	for empty in 0..k {
		if counts[empty] != 0 {
			continue;
		}

		// Pick a donor with probability proportional to its size beyond one point.
		let total: usize = counts.iter().map(|count| count.saturating_sub(1)).sum();

		if total == 0 {
			return;
		}

		let mut draw = rng.gen_range(0..total);
		let mut donor = 0;

		for (idx, count) in counts.iter().enumerate() {
			let weight = count.saturating_sub(1);

			if draw < weight {
				donor = idx;

				break;
			}

			draw -= weight;
		}

		for d in 0..dim {
			let value = centroids[donor * dim + d];
			let (grow, shrink) = if d % 2 == 0 {
				(1.0 + SPLIT_EPS, 1.0 - SPLIT_EPS)
			} else {
				(1.0 - SPLIT_EPS, 1.0 + SPLIT_EPS)
			};

			centroids[empty * dim + d] = value * grow;
			centroids[donor * dim + d] = value * shrink;
		}

		counts[empty] = counts[donor] / 2;
		counts[donor] -= counts[empty];
	}
}
