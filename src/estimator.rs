//! The cardinality estimation pipeline: a raw HyperLogLog estimate corrected for small-range bias
//! against the tables in [`crate::bias`], blended with linear counting for very sparse register
//! arrays. Grounded in the `len`/`ep` pair from the jedisct1 HyperLogLog crate, generalized to the
//! dual sparse/dense representation this sketch keeps.

use crate::params::Params;

/// `alpha(p) * m^2 / indicator_sum`, the uncorrected HyperLogLog estimate.
pub(crate) fn raw_estimate(indicator_sum: f64, params: &Params) -> f64 {
    let m = params.m() as f64;
    params.alpha * m * m / indicator_sum
}

/// `m * ln(m / (m - non_zero))`.
///
/// Only defined for `non_zero < m`: every caller in this crate checks that bound first, since it
/// can only fail to hold after a transition to dense has already happened (dense: `non_zero == m`
/// routes around this call entirely) or after the sparse list has already grown far past
/// `sparse_list_max` (which triggers a dense transition long before `non_zero` could reach
/// `2^sparse_precision`).
pub(crate) fn linear_estimate(non_zero: usize, m: usize) -> f64 {
    debug_assert!(non_zero < m, "linear_estimate requires non_zero < m");
    let m = m as f64;
    m * (m / (m - non_zero as f64)).ln()
}

/// Full dense estimate: raw estimate, small-range bias correction, then threshold blending
/// against linear counting.
pub(crate) fn dense_estimate(indicator_sum: f64, nonzero: usize, params: &Params) -> f64 {
    let m = params.m();
    let mut e = raw_estimate(indicator_sum, params);
    if e <= 5.0 * m as f64 {
        e -= crate::bias::correct(params.precision(), e);
    }

    let h = if nonzero < m {
        linear_estimate(nonzero, m)
    } else {
        e
    };

    if h <= params.threshold { h } else { e }
}

/// Sparse estimate: pure linear counting over the distinct `index_sp` values seen so far.
pub(crate) fn sparse_estimate(distinct: usize, params: &Params) -> f64 {
    linear_estimate(distinct, params.sparse_m() as usize)
}
