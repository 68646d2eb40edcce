//! Bound classification and activity tags.

use serde::{Deserialize, Serialize};

use crate::linalg::Vector;

/// Magnitude at or beyond which a bound counts as infinite.
pub const INFINITE_BOUND: f64 = 1e20;

/// How a variable or constraint is bounded. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Only a finite upper bound.
    BoundedAbove,
    /// Only a finite lower bound.
    BoundedBelow,
    /// Both bounds finite (ranges and equalities).
    BoundedBoth,
    /// No finite bound.
    Unbounded,
}

/// Whether a bound or constraint sits at one of its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActivityStatus {
    #[default]
    Inactive,
    ActiveBelow,
    ActiveAbove,
    ActiveBothSides,
}

fn is_finite_lower(lower: f64) -> bool {
    lower > -INFINITE_BOUND
}

fn is_finite_upper(upper: f64) -> bool {
    upper < INFINITE_BOUND
}

/// Classify a single bound pair.
pub fn classify(lower: f64, upper: f64) -> ConstraintKind {
    match (is_finite_lower(lower), is_finite_upper(upper)) {
        (true, true) => ConstraintKind::BoundedBoth,
        (true, false) => ConstraintKind::BoundedBelow,
        (false, true) => ConstraintKind::BoundedAbove,
        (false, false) => ConstraintKind::Unbounded,
    }
}

/// Classify every entry of a pair of bound vectors.
pub fn classify_all(lower: &Vector, upper: &Vector) -> Vec<ConstraintKind> {
    assert_eq!(lower.len(), upper.len(), "Bound vectors differ in length");
    lower
        .iter()
        .zip(upper.iter())
        .map(|(&l, &u)| classify(l, u))
        .collect()
}

/// Activity of `value` against `[lower, upper]` within `tol`.
///
/// Only the sides that `kind` says are finite are compared.
pub fn activity(kind: ConstraintKind, value: f64, lower: f64, upper: f64, tol: f64) -> ActivityStatus {
    let at_lower = (value - lower).abs() < tol;
    let at_upper = (upper - value).abs() < tol;
    match kind {
        ConstraintKind::BoundedAbove if at_upper => ActivityStatus::ActiveAbove,
        ConstraintKind::BoundedBelow if at_lower => ActivityStatus::ActiveBelow,
        ConstraintKind::BoundedBoth => match (at_lower, at_upper) {
            (true, true) => ActivityStatus::ActiveBothSides,
            (true, false) => ActivityStatus::ActiveBelow,
            (false, true) => ActivityStatus::ActiveAbove,
            (false, false) => ActivityStatus::Inactive,
        },
        _ => ActivityStatus::Inactive,
    }
}
