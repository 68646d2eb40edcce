//! Sparse matrix types and operations.
//!
//! Two representations are used:
//!
//! - [`SparseTriplet`]: coordinate format in the order the NLP oracle
//!   evaluates nonzeros. Structure is fixed once by [`SparseTriplet::set_structure`];
//!   afterwards only values change.
//! - [`CompressedColumn`]: column-major compressed format consumed by QP
//!   backends. It remembers, for each compressed slot, which triplet
//!   position fills it, so value refreshes never re-sort.
//!
//! Symmetric matrices store a single triangle. Products and norms mirror
//! off-diagonal entries implicitly.

use std::collections::HashSet;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};

use super::vector::Vector;
use crate::error::{SqpError, SqpResult};

/// Sparse matrix in CSC format, as handed to sprs-based consumers.
pub type SparseCsc = CsMat<f64>;

/// A block `value * I` of dimension `size` placed at (`row_offset`, `col_offset`).
///
/// The QP Jacobian carries fixed ±identity blocks for the penalty slacks;
/// their placement is computed once from the problem dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdentityBlock {
    pub row_offset: usize,
    pub col_offset: usize,
    pub size: usize,
    pub value: f64,
}

impl IdentityBlock {
    pub fn new(row_offset: usize, col_offset: usize, size: usize, value: f64) -> Self {
        Self {
            row_offset,
            col_offset,
            size,
            value,
        }
    }
}

/// Coordinate-format sparse matrix with a one-time structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseTriplet {
    num_rows: usize,
    num_cols: usize,
    symmetric: bool,
    row_indices: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
    /// `order[k]` is the triplet position of the k-th entry in column-major order.
    order: Vec<usize>,
    structure_set: bool,
}

impl SparseTriplet {
    /// Allocate a matrix with `nnz` entries and no structure yet.
    pub fn new(num_rows: usize, num_cols: usize, nnz: usize, symmetric: bool) -> Self {
        Self {
            num_rows,
            num_cols,
            symmetric,
            row_indices: vec![0; nnz],
            col_indices: vec![0; nnz],
            values: vec![0.0; nnz],
            order: (0..nnz).collect(),
            structure_set: false,
        }
    }

    /// Build a matrix from (row, col, value) entries in one go.
    pub fn from_entries<I>(
        num_rows: usize,
        num_cols: usize,
        symmetric: bool,
        entries: I,
    ) -> SqpResult<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for (i, j, v) in entries {
            rows.push(i);
            cols.push(j);
            vals.push(v);
        }
        let mut mat = Self::new(num_rows, num_cols, vals.len(), symmetric);
        mat.set_structure(&rows, &cols)?;
        mat.set_values(&vals)?;
        Ok(mat)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn has_structure(&self) -> bool {
        self.structure_set
    }

    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Fix the sparsity pattern. Allowed exactly once per matrix.
    pub fn set_structure(&mut self, rows: &[usize], cols: &[usize]) -> SqpResult<()> {
        if self.structure_set {
            return Err(SqpError::Structure(
                "structure of a sparse matrix can only be set once".to_string(),
            ));
        }
        let nnz = self.nnz();
        if rows.len() != nnz || cols.len() != nnz {
            return Err(SqpError::Structure(format!(
                "expected {} structure entries, got {} rows and {} cols",
                nnz,
                rows.len(),
                cols.len()
            )));
        }
        for (&i, &j) in rows.iter().zip(cols) {
            if i >= self.num_rows || j >= self.num_cols {
                return Err(SqpError::Structure(format!(
                    "entry ({}, {}) outside {}x{} matrix",
                    i, j, self.num_rows, self.num_cols
                )));
            }
        }
        if self.symmetric {
            if self.num_rows != self.num_cols {
                return Err(SqpError::Structure(
                    "symmetric matrix must be square".to_string(),
                ));
            }
            let mut seen = HashSet::with_capacity(nnz);
            for (&i, &j) in rows.iter().zip(cols) {
                if i != j && seen.contains(&(j, i)) {
                    return Err(SqpError::Structure(format!(
                        "symmetric matrix stores both ({}, {}) and ({}, {})",
                        i, j, j, i
                    )));
                }
                seen.insert((i, j));
            }
        }

        self.row_indices.copy_from_slice(rows);
        self.col_indices.copy_from_slice(cols);

        let mut order: Vec<usize> = (0..nnz).collect();
        order.sort_by_key(|&k| (self.col_indices[k], self.row_indices[k]));
        self.order = order;
        self.structure_set = true;
        Ok(())
    }

    /// Replace all values, keeping the structure.
    pub fn set_values(&mut self, values: &[f64]) -> SqpResult<()> {
        if values.len() != self.nnz() {
            return Err(SqpError::Structure(format!(
                "expected {} values, got {}",
                self.nnz(),
                values.len()
            )));
        }
        self.values.copy_from_slice(values);
        Ok(())
    }

    /// Deep copy of structure and values from `other`.
    pub fn copy_from(&mut self, other: &SparseTriplet) -> SqpResult<()> {
        if other.num_rows != self.num_rows
            || other.num_cols != self.num_cols
            || other.symmetric != self.symmetric
        {
            return Err(SqpError::Structure(format!(
                "cannot copy {}x{} matrix into {}x{} matrix",
                other.num_rows, other.num_cols, self.num_rows, self.num_cols
            )));
        }
        self.clone_from(other);
        Ok(())
    }

    fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.row_indices
            .iter()
            .zip(&self.col_indices)
            .zip(&self.values)
            .map(|((&i, &j), &v)| (i, j, v))
    }

    /// y = A x
    pub fn times(&self, x: &[f64]) -> Vector {
        assert_eq!(x.len(), self.num_cols, "Dimension mismatch in times");
        let mut y = Vector::new(self.num_rows);
        for (i, j, v) in self.entries() {
            y[i] += v * x[j];
            if self.symmetric && i != j {
                y[j] += v * x[i];
            }
        }
        y
    }

    /// y = A^T x
    pub fn transposed_times(&self, x: &[f64]) -> Vector {
        assert_eq!(x.len(), self.num_rows, "Dimension mismatch in transposed_times");
        let mut y = Vector::new(self.num_cols);
        for (i, j, v) in self.entries() {
            y[j] += v * x[i];
            if self.symmetric && i != j {
                y[i] += v * x[j];
            }
        }
        y
    }

    /// Dense copy, mirrored when symmetric, duplicates summed.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.num_rows, self.num_cols);
        for (i, j, v) in self.entries() {
            dense[(i, j)] += v;
            if self.symmetric && i != j {
                dense[(j, i)] += v;
            }
        }
        dense
    }

    /// Maximum absolute column sum.
    pub fn one_norm(&self) -> f64 {
        let mut sums = vec![0.0; self.num_cols];
        for (i, j, v) in self.entries() {
            sums[j] += v.abs();
            if self.symmetric && i != j {
                sums[i] += v.abs();
            }
        }
        sums.into_iter().fold(0.0_f64, f64::max)
    }

    /// Maximum absolute row sum.
    pub fn inf_norm(&self) -> f64 {
        let mut sums = vec![0.0; self.num_rows];
        for (i, j, v) in self.entries() {
            sums[i] += v.abs();
            if self.symmetric && i != j {
                sums[j] += v.abs();
            }
        }
        sums.into_iter().fold(0.0_f64, f64::max)
    }

    /// Full (mirrored when symmetric) CSC matrix with duplicates summed.
    pub fn to_csc(&self) -> SparseCsc {
        let mut tri = TriMat::new((self.num_rows, self.num_cols));
        for (i, j, v) in self.entries() {
            tri.add_triplet(i, j, v);
            if self.symmetric && i != j {
                tri.add_triplet(j, i, v);
            }
        }
        tri.to_csc()
    }
}

/// Column-major compressed sparse matrix built from a [`SparseTriplet`].
///
/// May embed the triplet in a larger matrix and append fixed identity
/// blocks. For symmetric input every entry is stored in the upper triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedColumn {
    num_rows: usize,
    num_cols: usize,
    symmetric: bool,
    col_ptr: Vec<usize>,
    row_indices: Vec<usize>,
    values: Vec<f64>,
    /// Triplet position feeding each slot; `None` for identity entries.
    source: Vec<Option<usize>>,
    triplet_nnz: usize,
}

impl CompressedColumn {
    /// Same-shape conversion.
    pub fn from_triplet(triplet: &SparseTriplet) -> SqpResult<Self> {
        Self::from_triplet_embedded(triplet, triplet.num_rows, triplet.num_cols, &[])
    }

    /// Place `triplet` in the top-left corner of a `num_rows x num_cols`
    /// matrix and add `identities`.
    ///
    /// Entries are sorted stably by column, ties broken by increasing row.
    pub fn from_triplet_embedded(
        triplet: &SparseTriplet,
        num_rows: usize,
        num_cols: usize,
        identities: &[IdentityBlock],
    ) -> SqpResult<Self> {
        if !triplet.has_structure() && triplet.nnz() > 0 {
            return Err(SqpError::Structure(
                "cannot compress a matrix whose structure was never set".to_string(),
            ));
        }
        if triplet.num_rows > num_rows || triplet.num_cols > num_cols {
            return Err(SqpError::Structure(format!(
                "{}x{} matrix does not fit in {}x{}",
                triplet.num_rows, triplet.num_cols, num_rows, num_cols
            )));
        }
        for block in identities {
            if block.row_offset + block.size > num_rows || block.col_offset + block.size > num_cols
            {
                return Err(SqpError::Structure(format!(
                    "identity block of size {} at ({}, {}) outside {}x{}",
                    block.size, block.row_offset, block.col_offset, num_rows, num_cols
                )));
            }
        }

        // (col, row, value, source)
        let mut entries: Vec<(usize, usize, f64, Option<usize>)> =
            Vec::with_capacity(triplet.nnz() + identities.iter().map(|b| b.size).sum::<usize>());
        for (k, (i, j, v)) in triplet.entries().enumerate() {
            let (i, j) = if triplet.symmetric && i > j { (j, i) } else { (i, j) };
            entries.push((j, i, v, Some(k)));
        }
        for block in identities {
            for d in 0..block.size {
                entries.push((block.col_offset + d, block.row_offset + d, block.value, None));
            }
        }
        entries.sort_by_key(|e| (e.0, e.1));

        let mut col_ptr = vec![0; num_cols + 1];
        for e in &entries {
            col_ptr[e.0 + 1] += 1;
        }
        for j in 0..num_cols {
            col_ptr[j + 1] += col_ptr[j];
        }

        Ok(Self {
            num_rows,
            num_cols,
            symmetric: triplet.symmetric,
            col_ptr,
            row_indices: entries.iter().map(|e| e.1).collect(),
            values: entries.iter().map(|e| e.2).collect(),
            source: entries.iter().map(|e| e.3).collect(),
            triplet_nnz: triplet.nnz(),
        })
    }

    /// Refresh the values that came from a triplet with the same structure.
    pub fn update_values(&mut self, triplet: &SparseTriplet) -> SqpResult<()> {
        if triplet.nnz() != self.triplet_nnz {
            return Err(SqpError::Structure(format!(
                "value update with {} entries, compressed matrix expects {}",
                triplet.nnz(),
                self.triplet_nnz
            )));
        }
        let vals = triplet.values();
        for (slot, src) in self.values.iter_mut().zip(&self.source) {
            if let Some(k) = src {
                *slot = vals[*k];
            }
        }
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.num_cols).flat_map(move |j| {
            (self.col_ptr[j]..self.col_ptr[j + 1])
                .map(move |k| (self.row_indices[k], j, self.values[k]))
        })
    }

    /// y = A x
    pub fn times(&self, x: &[f64]) -> Vector {
        assert_eq!(x.len(), self.num_cols, "Dimension mismatch in times");
        let mut y = Vector::new(self.num_rows);
        for (i, j, v) in self.entries() {
            y[i] += v * x[j];
            if self.symmetric && i != j {
                y[j] += v * x[i];
            }
        }
        y
    }

    /// y = A^T x
    pub fn transposed_times(&self, x: &[f64]) -> Vector {
        assert_eq!(x.len(), self.num_rows, "Dimension mismatch in transposed_times");
        let mut y = Vector::new(self.num_cols);
        for (i, j, v) in self.entries() {
            y[j] += v * x[i];
            if self.symmetric && i != j {
                y[i] += v * x[j];
            }
        }
        y
    }

    /// Back to coordinate format, entries in column-major order.
    pub fn to_triplet(&self) -> SqpResult<SparseTriplet> {
        SparseTriplet::from_entries(self.num_rows, self.num_cols, self.symmetric, self.entries())
    }

    /// CSC of the stored entries (upper triangle only when symmetric),
    /// duplicates summed and rows sorted.
    pub fn to_csc(&self) -> SparseCsc {
        let mut tri = TriMat::new((self.num_rows, self.num_cols));
        for (i, j, v) in self.entries() {
            tri.add_triplet(i, j, v);
        }
        tri.to_csc()
    }
}
