//! A HyperLogLog++ cardinality estimator: a sketch that approximates the number of distinct
//! elements inserted into it using sub-linear memory, automatically promoting from a sparse
//! representation to a dense one as load grows.
//!
//! ```
//! use hyperloglogpp::Sketch;
//!
//! let mut sketch: Sketch<u64> = Sketch::new(14, 20, false, hyperloglogpp::DEFAULT_SEED).unwrap();
//! for i in 1..=1000u64 {
//!     sketch.insert(i);
//! }
//! let estimate = sketch.estimate();
//! assert!((900.0..1100.0).contains(&estimate));
//! ```

use std::marker::PhantomData;

use dense::DenseState;
use sparse::SparseState;

mod bias;
mod codec;
mod dense;
mod error;
mod estimator;
mod hash;
mod params;
mod sparse;

pub use error::{HllError, ParamsError};
pub use hash::{DEFAULT_SEED, HllHash, LEGACY_SEED};
pub use params::Params;

#[derive(Clone, Debug)]
enum Representation {
    Sparse(SparseState),
    Dense(DenseState),
}

/// A HyperLogLog++ cardinality sketch over items of type `T`.
///
/// Mutated only by [`Sketch::insert`] and [`Sketch::merge`]; [`Sketch::estimate`] is a read-only
/// observer. `Sketch<T>` does not derive `PartialEq`: two sparse sketches holding the same logical
/// content can differ in unmerged temp-list ordering, so byte-for-byte equality would not track
/// the estimate-level equivalence this design promises. Compare `estimate()` instead, or
/// `dense_view()` once both sides are known to be dense.
#[derive(Clone, Debug)]
pub struct Sketch<T> {
    representation: Representation,
    params: Params,
    seed: u64,
    _marker: PhantomData<fn(T)>,
}

impl<T: HllHash> Sketch<T> {
    /// Build an empty sketch. `precision` (4..=18) sizes the dense array at `2^precision`
    /// registers; `sparse_precision` (must exceed `precision`, up to 58) sizes the sparse index
    /// space. `create_dense` starts the sketch directly in dense mode, for callers that already
    /// know the stream will be large; otherwise it starts sparse and promotes automatically.
    /// Returns `Err(HllError::UnsupportedParameters)` if `precision`/`sparse_precision` are out of
    /// range, before any allocation happens.
    pub fn new(
        precision: u8,
        sparse_precision: u8,
        create_dense: bool,
        seed: u64,
    ) -> Result<Self, HllError> {
        let params = Params::new(precision, sparse_precision)?;
        Ok(Self::with_params(params, create_dense, seed))
    }

    /// Build an empty sketch from an already-validated [`Params`]. Infallible, since `Params`
    /// can only be constructed through [`Params::new`]'s validation.
    pub fn with_params(params: Params, create_dense: bool, seed: u64) -> Self {
        let representation = if create_dense {
            Representation::Dense(DenseState::new(params.m()))
        } else {
            Representation::Sparse(SparseState::new())
        };

        Self {
            representation,
            params,
            seed,
            _marker: PhantomData,
        }
    }

    /// Add one element. Cannot fail on a well-constructed sketch.
    pub fn insert(&mut self, item: T) {
        let hash = item.hll_hash(self.seed);
        match &mut self.representation {
            Representation::Dense(dense) => dense.insert(hash, &self.params),
            Representation::Sparse(sparse) => {
                if sparse.insert(hash, &self.params) {
                    self.representation = Representation::Dense(sparse.to_dense(&self.params));
                }
            }
        }
    }

    /// Fold `other` into `self`. Fails with [`HllError::IncompatibleSeeds`] if the two sketches
    /// were built with different seeds; `self` is left unmodified on that error path.
    pub fn merge(&mut self, other: &Self) -> Result<(), HllError> {
        if self.seed != other.seed {
            return Err(HllError::IncompatibleSeeds {
                left: self.seed,
                right: other.seed,
            });
        }

        match (&mut self.representation, &other.representation) {
            (Representation::Sparse(left), Representation::Sparse(right)) => {
                left.merge_sparse(right);
                if left.is_full(&self.params) {
                    self.representation = Representation::Dense(left.to_dense(&self.params));
                }
            }
            (Representation::Sparse(left), Representation::Dense(right)) => {
                let mut dense = left.to_dense(&self.params);
                dense.merge_dense(right);
                self.representation = Representation::Dense(dense);
            }
            (Representation::Dense(left), Representation::Sparse(right)) => {
                let right_dense = right.to_dense(&self.params);
                left.merge_dense(&right_dense);
            }
            (Representation::Dense(left), Representation::Dense(right)) => {
                left.merge_dense(right);
            }
        }

        Ok(())
    }

    /// The current cardinality estimate. Cannot fail.
    pub fn estimate(&self) -> f64 {
        match &self.representation {
            Representation::Sparse(sparse) => {
                estimator::sparse_estimate(sparse.distinct_count(), &self.params)
            }
            Representation::Dense(dense) => {
                let (indicator_sum, nonzero) = dense.indicator();
                estimator::dense_estimate(indicator_sum, nonzero, &self.params)
            }
        }
    }

    /// The raw (pre-bias-correction) dense estimate minus `reference_cardinality`. Defined only
    /// when dense; fails with [`HllError::WrongRepresentation`] while sparse.
    pub fn measure_error(&self, reference_cardinality: u64) -> Result<f64, HllError> {
        match &self.representation {
            Representation::Dense(dense) => {
                let (indicator_sum, _) = dense.indicator();
                let raw = estimator::raw_estimate(indicator_sum, &self.params);
                Ok(raw - reference_cardinality as f64)
            }
            Representation::Sparse(_) => Err(HllError::WrongRepresentation),
        }
    }

    /// Whether the sketch is currently in sparse mode.
    pub fn is_sparse(&self) -> bool {
        matches!(self.representation, Representation::Sparse(_))
    }

    /// The dense register array, or an empty slice while sparse. Not an error: callers check
    /// [`Sketch::is_sparse`] first if they need to distinguish "empty slice" from "sparse".
    pub fn dense_view(&self) -> &[u8] {
        match &self.representation {
            Representation::Dense(dense) => dense.registers(),
            Representation::Sparse(_) => &[],
        }
    }

    /// The seed this sketch hashes with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The validated parameters this sketch was built with.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sketch(precision: u8, sparse_precision: u8, create_dense: bool) -> Sketch<u64> {
        Sketch::new(precision, sparse_precision, create_dense, DEFAULT_SEED).unwrap()
    }

    #[test]
    fn small_sparse_set_estimates_within_one_of_truth() {
        let mut h = sketch(18, 25, false);
        for i in 1..=20u64 {
            h.insert(i);
            let est = h.estimate();
            assert!(est < (i + 1) as f64, "i={i} est={est}");
            assert!((i as f64 - 1.0) < est, "i={i} est={est}");
        }
    }

    #[test]
    fn repeated_inserts_only_count_distinct_values() {
        let mut h = sketch(18, 25, false);
        for _ in 0..20 {
            for j in 1..=20u64 {
                h.insert(j);
            }
        }
        let est = h.estimate();
        assert!(est < 21.0);
        assert!(19.0 < est);
    }

    #[test]
    fn merging_sparse_counters_combines_their_ranges() {
        let mut h = sketch(18, 25, false);
        let mut h2 = sketch(18, 25, false);
        for i in 1..=20u64 {
            h.insert(i);
            h2.insert(i + 5);
        }
        h.merge(&h2).unwrap();
        let est = h.estimate();
        assert!(est < 26.0 && 24.0 < est);
    }

    #[test]
    fn merging_dense_into_sparse_combines_their_ranges() {
        let mut h = sketch(18, 25, false);
        let mut h2 = sketch(18, 25, true);
        for i in 1..=20u64 {
            h.insert(i);
            h2.insert(i + 5);
        }
        h.merge(&h2).unwrap();
        let est = h.estimate();
        assert!(est < 26.0 && 24.0 < est);
    }

    #[test]
    fn merging_sparse_into_dense_combines_their_ranges() {
        let mut h = sketch(18, 25, true);
        let mut h2 = sketch(18, 25, false);
        for i in 1..=20u64 {
            h.insert(i);
            h2.insert(i + 5);
        }
        h.merge(&h2).unwrap();
        let est = h.estimate();
        assert!(est < 26.0 && 24.0 < est);
    }

    #[test]
    fn merge_case_is_symmetric_regardless_of_which_side_is_dense() {
        for (left_dense, right_dense) in [(false, false), (false, true), (true, false), (true, true)] {
            let mut h = sketch(18, 25, left_dense);
            let mut h2 = sketch(18, 25, right_dense);
            for i in 1..=20u64 {
                h.insert(i);
                h2.insert(i + 5);
            }
            h.merge(&h2).unwrap();
            let est = h.estimate();
            assert!(est < 26.0 && 24.0 < est, "left_dense={left_dense} right_dense={right_dense} est={est}");
        }
    }

    #[test]
    fn large_dense_set_estimates_within_three_standard_errors() {
        let mut h = sketch(18, 25, true);
        let n: u64 = 10 * (1 << 18);
        for i in 1..=n {
            h.insert(i);
        }
        let est = h.estimate();
        let relative_error = 1.0 / (2.0f64.powi(18)).sqrt();
        let slack = 3.0 * relative_error * n as f64;
        assert!((est - n as f64).abs() < slack, "est={est} n={n} slack={slack}");
    }

    #[test]
    fn transition_from_sparse_to_dense_is_exact() {
        let precision = 10u8;
        let sparse_precision = 20u8;
        let mut sparse_twin = Sketch::<u64>::new(precision, sparse_precision, false, DEFAULT_SEED).unwrap();
        let mut dense_twin = Sketch::<u64>::new(precision, sparse_precision, true, DEFAULT_SEED).unwrap();

        let mut i = 0u64;
        while sparse_twin.is_sparse() {
            sparse_twin.insert(i);
            dense_twin.insert(i);
            i += 1;
        }

        assert_eq!(sparse_twin.dense_view(), dense_twin.dense_view());
        assert_eq!(sparse_twin.estimate(), dense_twin.estimate());
    }

    #[test]
    fn small_cardinalities_grow_monotonically() {
        let mut h = sketch(14, 20, false);
        for i in 1..=20u64 {
            h.insert(i);
            let est = h.estimate();
            assert!(
                (i as f64 - 1.0) < est && est < (i as f64 + 1.0),
                "i={i} est={est}"
            );
        }
    }

    #[test]
    fn merge_into_a_clone_of_self_is_a_no_op_on_the_estimate() {
        let mut h = sketch(14, 20, false);
        for i in 1..=20u64 {
            h.insert(i);
        }
        let before = h.estimate();
        let mut h_clone = h.clone();
        h_clone.merge(&h).unwrap();
        assert!((h_clone.estimate() - before).abs() < 1e-9);
    }

    #[test]
    fn merge_rejects_mismatched_seeds() {
        let mut a = Sketch::<u64>::new(14, 20, false, 1).unwrap();
        let b = Sketch::<u64>::new(14, 20, false, 2).unwrap();
        a.insert(1);
        let err = a.merge(&b).unwrap_err();
        assert_eq!(
            err,
            HllError::IncompatibleSeeds { left: 1, right: 2 }
        );
    }

    #[test]
    fn measure_error_fails_while_sparse() {
        let h = sketch(14, 20, false);
        assert_eq!(h.measure_error(0).unwrap_err(), HllError::WrongRepresentation);
    }

    #[test]
    fn measure_error_reports_signed_difference_from_reference() {
        let mut h = sketch(14, 20, true);
        for i in 1..=1000u64 {
            h.insert(i);
        }
        let error = h.measure_error(1000).unwrap();
        assert!(error.abs() < 200.0);
    }

    #[test]
    fn dense_view_is_empty_while_sparse() {
        let h = sketch(14, 20, false);
        assert!(h.is_sparse());
        assert!(h.dense_view().is_empty());
    }

    #[test]
    fn rejects_invalid_params() {
        let err = Sketch::<u64>::new(3, 20, false, DEFAULT_SEED).unwrap_err();
        assert_eq!(err, HllError::UnsupportedParameters(ParamsError::PrecisionOutOfRange(3)));
    }

    #[test]
    fn merge_order_does_not_affect_the_final_estimate() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(7);
        let shards: Vec<Sketch<u64>> = (0..5)
            .map(|shard| {
                let mut s = sketch(14, 20, false);
                for i in 0..40u64 {
                    s.insert(shard * 40 + i);
                }
                s
            })
            .collect();

        let merge_in_order = |order: &[usize]| {
            let mut acc = sketch(14, 20, false);
            for &i in order {
                acc.merge(&shards[i]).unwrap();
            }
            acc.estimate()
        };

        let baseline_order: Vec<usize> = (0..shards.len()).collect();
        let baseline = merge_in_order(&baseline_order);

        let mut shuffled = baseline_order.clone();
        shuffled.shuffle(&mut rng);
        let shuffled_estimate = merge_in_order(&shuffled);

        assert!((baseline - shuffled_estimate).abs() < 1e-9);
    }
}
