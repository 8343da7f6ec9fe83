//! Random sub-table slices of the cross product.

use std::collections::BTreeSet;

use rand::Rng;

use dp_relational_core::{permutation, sample_without_replacement, RelationshipVector};

use crate::config::AssignmentMode;

/// Row subsets of both tables plus the global offsets of their cross product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slice {
    /// Sliced table-1 rows.
    pub table1: Vec<usize>,
    /// Sliced table-2 rows.
    pub table2: Vec<usize>,
    /// `offsets[a * table2.len() + c] = table1[a] * n2 + table2[c]`.
    pub offsets: Vec<usize>,
}

impl Slice {
    /// Build a slice and its row-major offsets.
    pub fn new(table1: Vec<usize>, table2: Vec<usize>, n2: usize) -> Self {
        let offsets = table1
            .iter()
            .flat_map(|&i| table2.iter().map(move |&j| i * n2 + j))
            .collect();
        Self {
            table1,
            table2,
            offsets,
        }
    }

    /// Number of cross-product cells.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the slice has no cells.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Slice dimensions, fixed for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceSizes {
    /// Table-1 rows per slice.
    pub table1: usize,
    /// Table-2 rows per slice.
    pub table2: usize,
}

fn clip_to_rows(x: f64, n: usize) -> usize {
    x.max(1.0).min(n as f64) as usize
}

impl SliceSizes {
    /// Square-ish slice covering about `subtable_size` cells.
    ///
    /// Both tables are cut by the same fraction `sqrt(subtable_size / (n1 n2))`.
    pub fn standard(n1: usize, n2: usize, subtable_size: usize) -> Self {
        let frac = (subtable_size as f64 / (n1 as f64 * n2 as f64)).sqrt();
        Self {
            table1: clip_to_rows(frac * n1 as f64, n1),
            table2: clip_to_rows(frac * n2 as f64, n2),
        }
    }

    /// Slice with `expansion_ratio` times more table-2 rows than table-1 rows.
    pub fn one_to_many(n1: usize, n2: usize, subtable_size: usize, expansion_ratio: f64) -> Self {
        let side = (subtable_size as f64 / expansion_ratio).sqrt();
        Self {
            table1: clip_to_rows(side, n1),
            table2: clip_to_rows(side * expansion_ratio, n2),
        }
    }
}

/// Draws a fresh slice every iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SliceSampler {
    /// Both sides drawn uniformly without replacement.
    Standard {
        /// Slice dimensions.
        sizes: SliceSizes,
    },
    /// Table-2 side always contains the partners of the sliced table-1 rows.
    OneToMany {
        /// Slice dimensions.
        sizes: SliceSizes,
    },
}

impl SliceSampler {
    /// Sampler for tables of size `n1 × n2`.
    pub fn new(n1: usize, n2: usize, subtable_size: usize, mode: &AssignmentMode) -> Self {
        match *mode {
            AssignmentMode::Standard => SliceSampler::Standard {
                sizes: SliceSizes::standard(n1, n2, subtable_size),
            },
            AssignmentMode::OneToMany { expansion_ratio } => SliceSampler::OneToMany {
                sizes: SliceSizes::one_to_many(n1, n2, subtable_size, expansion_ratio),
            },
        }
    }

    /// Slice dimensions.
    pub fn sizes(&self) -> SliceSizes {
        match *self {
            SliceSampler::Standard { sizes } | SliceSampler::OneToMany { sizes } => sizes,
        }
    }

    /// Draw a slice given the current assignment.
    pub fn sample<R: Rng + ?Sized>(&self, b: &RelationshipVector, rng: &mut R) -> Slice {
        let (n1, n2) = (b.n1(), b.n2());
        match *self {
            SliceSampler::Standard { sizes } => Slice::new(
                sample_without_replacement(n1, sizes.table1, rng),
                sample_without_replacement(n2, sizes.table2, rng),
                n2,
            ),
            SliceSampler::OneToMany { sizes } => {
                let table1 = sample_without_replacement(n1, sizes.table1, rng);
                let guaranteed: BTreeSet<usize> =
                    table1.iter().flat_map(|&i| b.partners(i)).collect();
                let fill = sizes.table2.saturating_sub(guaranteed.len());
                let mut table2: Vec<usize> = guaranteed.iter().copied().collect();
                table2.extend(
                    permutation(n2, rng)
                        .into_iter()
                        .filter(|j| !guaranteed.contains(j))
                        .take(fill),
                );
                Slice::new(table1, table2, n2)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn standard_sizes_follow_the_fraction() {
        let s = SliceSizes::standard(1000, 400, 10_000);
        // frac = sqrt(10000 / 400000) = 0.158...
        assert_eq!(s.table1, 158);
        assert_eq!(s.table2, 63);
        let whole = SliceSizes::standard(10, 20, 1_000_000);
        assert_eq!((whole.table1, whole.table2), (10, 20));
        let tiny = SliceSizes::standard(1000, 1000, 1);
        assert_eq!((tiny.table1, tiny.table2), (1, 1));
    }

    #[test]
    fn one_to_many_sizes_apply_the_ratio() {
        let s = SliceSizes::one_to_many(1000, 1000, 250, 2.5);
        assert_eq!((s.table1, s.table2), (10, 25));
    }

    #[test]
    fn offsets_are_row_major() {
        let s = Slice::new(vec![2, 0], vec![1, 3, 0], 4);
        assert_eq!(s.offsets, vec![9, 11, 8, 1, 3, 0]);
        assert_eq!(s.len(), 6);
    }

    #[test]
    fn standard_slice_draws_distinct_rows() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let b = RelationshipVector::empty(50, 30);
        let sampler = SliceSampler::new(50, 30, 100, &AssignmentMode::Standard);
        let slice = sampler.sample(&b, &mut rng);
        let mut t1 = slice.table1.clone();
        t1.sort_unstable();
        t1.dedup();
        assert_eq!(t1.len(), sampler.sizes().table1);
        assert_eq!(slice.len(), sampler.sizes().table1 * sampler.sizes().table2);
    }

    #[test]
    fn one_to_many_slice_contains_partners() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let b = RelationshipVector::random_one_to_many(40, 60, &mut rng).expect("non-empty");
        let sampler = SliceSampler::new(40, 60, 50, &AssignmentMode::one_to_many());
        for _ in 0..20 {
            let slice = sampler.sample(&b, &mut rng);
            for &i in &slice.table1 {
                for j in b.partners(i) {
                    assert!(slice.table2.contains(&j));
                }
            }
            // Every sliced row keeps its relationship inside the slice.
            assert_eq!(b.count_in(&slice.offsets), slice.table1.len());
            let mut t2 = slice.table2.clone();
            t2.sort_unstable();
            t2.dedup();
            assert_eq!(t2.len(), slice.table2.len());
        }
    }
}
