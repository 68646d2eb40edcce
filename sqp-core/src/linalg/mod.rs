//! Linear algebra building blocks: dense vectors and sparse matrices.

pub mod sparse;
pub mod vector;

pub use sparse::{CompressedColumn, IdentityBlock, SparseCsc, SparseTriplet};
pub use vector::Vector;
