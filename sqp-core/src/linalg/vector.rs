//! Dense vectors with a fixed length.
//!
//! Every buffer the driver owns (iterate, constraint values, bounds,
//! multipliers, step) is a [`Vector`] sized once from the NLP dimensions.
//! Binary operations require equal lengths; sub-ranges are explicit.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Owned, fixed-length array of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    values: Vec<f64>,
}

impl Vector {
    /// Zero vector of length `size`.
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0.0; size],
        }
    }

    /// Vector filled with `value`.
    pub fn filled(size: usize, value: f64) -> Self {
        Self {
            values: vec![value; size],
        }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            values: values.to_vec(),
        }
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    /// Overwrite all entries with those of `other`.
    pub fn copy_from(&mut self, other: &[f64]) {
        assert_eq!(self.len(), other.len(), "Vector length mismatch in copy");
        self.values.copy_from_slice(other);
    }

    /// Overwrite entries from the first `self.len()` entries of `other`.
    ///
    /// Used to pull the step block out of a longer QP solution.
    pub fn copy_head_from(&mut self, other: &[f64]) {
        let n = self.len();
        assert!(other.len() >= n, "Source too short for head copy");
        self.values.copy_from_slice(&other[..n]);
    }

    /// Write `src` into `self[offset..offset + src.len()]`.
    pub fn copy_into_range(&mut self, offset: usize, src: &[f64]) {
        assert!(offset + src.len() <= self.len(), "Range out of bounds");
        self.values[offset..offset + src.len()].copy_from_slice(src);
    }

    pub fn set_to_zero(&mut self) {
        self.values.fill(0.0);
    }

    /// self += other
    pub fn add_vector(&mut self, other: &[f64]) {
        assert_eq!(self.len(), other.len(), "Vector length mismatch in add");
        for (a, b) in self.values.iter_mut().zip(other) {
            *a += b;
        }
    }

    /// self -= other
    pub fn subtract_vector(&mut self, other: &[f64]) {
        assert_eq!(self.len(), other.len(), "Vector length mismatch in subtract");
        for (a, b) in self.values.iter_mut().zip(other) {
            *a -= b;
        }
    }

    /// self += alpha * x
    pub fn axpy(&mut self, alpha: f64, x: &[f64]) {
        assert_eq!(self.len(), x.len(), "Vector length mismatch in axpy");
        for (a, b) in self.values.iter_mut().zip(x) {
            *a += alpha * b;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for a in self.values.iter_mut() {
            *a *= factor;
        }
    }

    pub fn dot(&self, other: &[f64]) -> f64 {
        assert_eq!(self.len(), other.len(), "Vector length mismatch in dot");
        self.values.iter().zip(other).map(|(a, b)| a * b).sum()
    }

    pub fn one_norm(&self) -> f64 {
        self.values.iter().map(|v| v.abs()).sum()
    }

    pub fn two_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn inf_norm(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// One-norm of `self[start..start + len]`.
    pub fn one_norm_range(&self, start: usize, len: usize) -> f64 {
        assert!(start + len <= self.len(), "Range out of bounds");
        self.values[start..start + len].iter().map(|v| v.abs()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.values.iter()
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.values[i]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.values[i]
    }
}

impl AsRef<[f64]> for Vector {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

impl From<Vec<f64>> for Vector {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norms() {
        let v = Vector::from_slice(&[3.0, -4.0, 0.0]);
        assert!((v.one_norm() - 7.0).abs() < 1e-12);
        assert!((v.two_norm() - 5.0).abs() < 1e-12);
        assert!((v.inf_norm() - 4.0).abs() < 1e-12);
        assert!((v.one_norm_range(1, 2) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic() {
        let mut v = Vector::from_slice(&[1.0, 2.0]);
        v.add_vector(&[1.0, 1.0]);
        v.axpy(2.0, &[0.5, -1.0]);
        v.subtract_vector(&[1.0, 0.0]);
        assert_eq!(v.values(), &[2.0, 1.0]);

        v.scale(0.5);
        assert_eq!(v.values(), &[1.0, 0.5]);
        assert!((v.dot(&[2.0, 2.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sub_ranges() {
        let mut head = Vector::new(2);
        head.copy_head_from(&[7.0, 8.0, 9.0, 10.0]);
        assert_eq!(head.values(), &[7.0, 8.0]);

        let mut v = Vector::new(4);
        v.copy_into_range(1, &[5.0, 6.0]);
        assert_eq!(v.values(), &[0.0, 5.0, 6.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn test_size_mismatch_panics() {
        let mut v = Vector::new(2);
        v.add_vector(&[1.0, 2.0, 3.0]);
    }
}
