use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::kmeans::{self, Assignment};

/// Dimensions per quantization segment.
pub const SEGMENT_DIM: usize = 2;
/// Bits per segment code.
pub const CODE_BITS: u32 = 4;
/// Centroids per segment codebook.
pub const CODEBOOK_SIZE: usize = 1 << CODE_BITS;

/// Product quantizer with 2-dimensional segments and 4-bit codes, two codes per byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductQuantizer {
	dim: usize,
	segments: usize,
	// segments * CODEBOOK_SIZE * SEGMENT_DIM, row-major by segment then code.
	codebooks: Vec<f32>,
}
impl ProductQuantizer {
	/// Trains one codebook per segment on row-major `data`. `data` must hold at least
	/// `CODEBOOK_SIZE` vectors of an even dimension.
	pub fn train<R>(data: &[f32], dim: usize, iterations: u32, rng: &mut R) -> Self
	where
		R: Rng + ?Sized,
	{
		let segments = dim / SEGMENT_DIM;
		let n = data.len() / dim;
		let mut codebooks = Vec::with_capacity(segments * CODEBOOK_SIZE * SEGMENT_DIM);
		let mut slice = Vec::with_capacity(n * SEGMENT_DIM);

		for segment in 0..segments {
			let offset = segment * SEGMENT_DIM;

			slice.clear();

			for vector in data.chunks_exact(dim) {
				slice.extend_from_slice(&vector[offset..offset + SEGMENT_DIM]);
			}

			let centroids =
				kmeans::train(&slice, SEGMENT_DIM, CODEBOOK_SIZE, iterations, Assignment::L2, rng);

			codebooks.extend_from_slice(&centroids);
		}

		Self { dim, segments, codebooks }
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn segments(&self) -> usize {
		self.segments
	}

	/// Bytes per encoded vector.
	pub fn code_size(&self) -> usize {
		self.segments.div_ceil(2)
	}

	/// Appends the packed code of `vector` to `out`. Even segments land in the low nibble.
	pub fn encode_into(&self, vector: &[f32], out: &mut Vec<u8>) {
		let mut byte = 0_u8;

		for segment in 0..self.segments {
			let offset = segment * SEGMENT_DIM;
			let code = kmeans::nearest(
				&vector[offset..offset + SEGMENT_DIM],
				self.codebook(segment),
				SEGMENT_DIM,
				Assignment::L2,
			) as u8;

			if segment % 2 == 0 {
				byte = code;
			} else {
				out.push(byte | (code << CODE_BITS));
			}
		}

		if self.segments % 2 == 1 {
			out.push(byte);
		}
	}

	pub fn decode(&self, codes: &[u8]) -> Vec<f32> {
		let mut vector = Vec::with_capacity(self.dim);

		for segment in 0..self.segments {
			let code = code_at(codes, segment);
			let start = code * SEGMENT_DIM;

			vector.extend_from_slice(&self.codebook(segment)[start..start + SEGMENT_DIM]);
		}

		vector
	}

	/// Inner products of each query segment with every centroid of that segment's codebook.
	pub fn lookup_table(&self, query: &[f32]) -> Vec<f32> {
		let mut table = Vec::with_capacity(self.segments * CODEBOOK_SIZE);

		for segment in 0..self.segments {
			let offset = segment * SEGMENT_DIM;
			let part = &query[offset..offset + SEGMENT_DIM];

			for centroid in self.codebook(segment).chunks_exact(SEGMENT_DIM) {
				table.push(kmeans::dot(part, centroid));
			}
		}

		table
	}

	pub fn score(&self, table: &[f32], codes: &[u8]) -> f32 {
		(0..self.segments)
			.map(|segment| table[segment * CODEBOOK_SIZE + code_at(codes, segment)])
			.sum()
	}

	fn codebook(&self, segment: usize) -> &[f32] {
		let width = CODEBOOK_SIZE * SEGMENT_DIM;

		&self.codebooks[segment * width..(segment + 1) * width]
	}
}

fn code_at(codes: &[u8], segment: usize) -> usize {
	let byte = codes[segment / 2];

	if segment % 2 == 0 { (byte & 0x0F) as usize } else { (byte >> CODE_BITS) as usize }
}
