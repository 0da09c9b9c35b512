pub mod artifact;
pub mod corpus;
pub mod ivf;
pub mod jsonl;
pub mod kmeans;
pub mod models;
pub mod pq;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
