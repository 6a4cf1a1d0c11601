// src/engine/points.rs

//! Point budget: only weights feed the total, ratings never do.

use crate::config::{MAX_VALID_POINTS, MIN_VALID_POINTS};

/// `Σ weight * multiplier` over every weight in the allocation.
pub fn total_points<'a, I>(weights: I, multiplier: f64) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    weights
        .into_iter()
        .fold(0.0, |sum, weight| sum + weight * multiplier)
}

/// True when `total` lies in the inclusive window [102, 103].
pub fn is_valid_points(total: f64) -> bool {
    (MIN_VALID_POINTS..=MAX_VALID_POINTS).contains(&total)
}
