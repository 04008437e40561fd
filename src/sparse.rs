//! Sparse representation: a sorted list of encoded `(index, rank)` words plus a small unsorted
//! temp buffer that absorbs new inserts cheaply and is folded into the sorted list in batches.

use std::cmp::Ordering;

use crate::codec;
use crate::dense::DenseState;
use crate::params::Params;

#[derive(Clone, Debug)]
pub(crate) struct SparseState {
    sparse_list: Vec<u64>,
    temp_list: Vec<u64>,
}

impl SparseState {
    pub(crate) fn new() -> Self {
        Self {
            sparse_list: Vec::new(),
            temp_list: Vec::new(),
        }
    }

    /// Record a hash's `(index, rank)` pair at `params.sparse_precision()`, folding the temp
    /// buffer into the sorted list once it fills up. Returns whether the sketch should now
    /// transition to dense.
    pub(crate) fn insert(&mut self, hash: u64, params: &Params) -> bool {
        let (index, rank) = codec::extract(hash, params.sparse_precision());
        self.temp_list.push(codec::encode(index, rank));

        if self.temp_list.len() >= params.temp_list_max {
            self.fold_temp();
        }

        self.sparse_list.len() >= params.sparse_list_max
    }

    /// Normalize `temp_list` and sort-merge it into `sparse_list`. Mutates self.
    fn fold_temp(&mut self) {
        if self.temp_list.is_empty() {
            return;
        }
        let mut temp = std::mem::take(&mut self.temp_list);
        normalize(&mut temp);
        self.sparse_list = merge_sorted(&self.sparse_list, &temp);
    }

    /// The sketch's content as a single sorted, deduplicated word list, without mutating
    /// `sparse_list` or `temp_list`. Every read-only observer goes through this: `estimate`,
    /// the right-hand side of a merge, a dense-from-sparse conversion that must leave the
    /// original sparse state untouched.
    fn normalized_words(&self) -> Vec<u64> {
        if self.temp_list.is_empty() {
            return self.sparse_list.clone();
        }
        let mut temp = self.temp_list.clone();
        normalize(&mut temp);
        merge_sorted(&self.sparse_list, &temp)
    }

    pub(crate) fn distinct_count(&self) -> usize {
        self.normalized_words().len()
    }

    pub(crate) fn is_full(&mut self, params: &Params) -> bool {
        self.fold_temp();
        self.sparse_list.len() >= params.sparse_list_max
    }

    /// Fold `other`'s content into `self` (sparse ∪ sparse). Leaves `self.temp_list` empty.
    pub(crate) fn merge_sparse(&mut self, other: &Self) {
        self.fold_temp();
        let other_words = other.normalized_words();
        self.sparse_list = merge_sorted(&self.sparse_list, &other_words);
    }

    /// Build the equivalent dense array at `params.precision()`, without mutating self.
    pub(crate) fn to_dense(&self, params: &Params) -> DenseState {
        let mut dense = DenseState::new(params.m());
        for word in self.normalized_words() {
            let (index, rank) = codec::decode(word);
            let (dense_index, dense_rank) =
                codec::sparse_to_dense(index, rank, params.precision(), params.sparse_precision());
            dense.set_if_greater(dense_index, dense_rank);
        }
        dense
    }
}

/// Sort ascending and dedup by index, keeping the highest rank per index.
///
/// Sorting groups every word for a given index together in increasing rank order (the index
/// occupies the high bits, the rank the low 6), so the last entry for an index in the sorted run
/// always has the highest rank. Dedup keeps that last entry rather than the first.
fn normalize(words: &mut Vec<u64>) {
    words.sort_unstable();
    let mut deduped: Vec<u64> = Vec::with_capacity(words.len());
    for &word in words.iter() {
        match deduped.last() {
            Some(&last) if codec::decode(last).0 == codec::decode(word).0 => {
                *deduped.last_mut().unwrap() = word;
            }
            _ => deduped.push(word),
        }
    }
    *words = deduped;
}

/// Merge two sorted, already-unique-by-index word lists into a new sorted, unique-by-index list,
/// keeping the higher rank on a colliding index.
fn merge_sorted(a: &[u64], b: &[u64]) -> Vec<u64> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (index_a, rank_a) = codec::decode(a[i]);
        let (index_b, rank_b) = codec::decode(b[j]);
        match index_a.cmp(&index_b) {
            Ordering::Less => {
                merged.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                merged.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                merged.push(codec::encode(index_a, rank_a.max(rank_b)));
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}
