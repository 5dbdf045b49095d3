/**
 * RecoReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::Instant;

use fnv::FnvHashMap;
use log::info;
use rand::{Rng, SeedableRng, XorShiftRng};
use scoped_pool::Pool;

use crate::error::KernelError;
use crate::llr;
use crate::llr::ScoredItem;
use crate::types;
use crate::types::{DenseVector, SparseMatrix};
use crate::utils;

/// Computes item similarities from interaction matrices whose rows denote the same entities.
///
/// Given only the primary matrix, the result holds a single item-by-item similarity matrix over
/// the columns of the primary matrix. Given a secondary matrix as well, a second result holds
/// the cross-similarities between the columns of the primary and the columns of the secondary
/// matrix.
pub trait SimilarityKernel {
    fn cooccurrences(
        &self,
        primary: &SparseMatrix,
        seed: u64,
        max_similarities_per_item: usize,
        max_prefs_per_row: usize,
        secondaries: &[&SparseMatrix],
    ) -> Result<Vec<SparseMatrix>, KernelError>;
}

type CooccurrenceCounts = Vec<FnvHashMap<u32, u32>>;

/// Scores co-occurring items with the loglikelihood ratio and keeps the highest scored items per
/// item. Rows with more than `max_prefs_per_row` interactions are randomly downsampled first.
pub struct CooccurrenceKernel {
    pool_size: usize,
}

impl CooccurrenceKernel {
    pub fn new(pool_size: usize) -> Self {
        CooccurrenceKernel { pool_size: pool_size.max(1) }
    }
}

impl SimilarityKernel for CooccurrenceKernel {

    fn cooccurrences(
        &self,
        primary: &SparseMatrix,
        seed: u64,
        max_similarities_per_item: usize,
        max_prefs_per_row: usize,
        secondaries: &[&SparseMatrix],
    ) -> Result<Vec<SparseMatrix>, KernelError> {

        if secondaries.len() > 1 {
            return Err(KernelError::UnsupportedSecondaryCount(secondaries.len()));
        }

        if let Some(secondary) = secondaries.first() {
            if secondary.num_rows() != primary.num_rows() {
                return Err(KernelError::RowCardinalityMismatch {
                    primary: primary.num_rows(),
                    secondary: secondary.num_rows(),
                });
            }
        }

        let start = Instant::now();
        let mut rng = seeded_rng(seed);
        let pool = Pool::new(self.pool_size);

        let num_rows = primary.num_rows() as u64;
        let num_items = primary.num_columns();

        let samples_of_a = downsample(primary, max_prefs_per_row, &mut rng);
        let item_interaction_counts = interaction_counts(&samples_of_a, num_items);

        let c = self_cooccurrences(&samples_of_a, num_items);

        let mut similarities = vec![
            rescore_all(
                &pool,
                &c,
                &item_interaction_counts,
                &item_interaction_counts,
                num_rows,
                max_similarities_per_item,
                true,
                num_items,
            )
        ];

        if let Some(secondary) = secondaries.first() {

            let samples_of_b = downsample(secondary, max_prefs_per_row, &mut rng);
            let other_interaction_counts =
                interaction_counts(&samples_of_b, secondary.num_columns());

            let d = cross_cooccurrences(&samples_of_a, &samples_of_b, num_items);

            similarities.push(rescore_all(
                &pool,
                &d,
                &item_interaction_counts,
                &other_interaction_counts,
                num_rows,
                max_similarities_per_item,
                false,
                secondary.num_columns(),
            ));
        }

        pool.shutdown();

        info!(
            "Computed {} similarity matrices for {} items in {}ms",
            similarities.len(),
            num_items,
            utils::to_millis(start.elapsed()),
        );

        Ok(similarities)
    }
}

fn seeded_rng(seed: u64) -> XorShiftRng {
    // The upper words keep the seed from ever being all zeros, which XorShift rejects
    XorShiftRng::from_seed([seed as u32, (seed >> 32) as u32, 0x9E37_79B9, 0x7F4A_7C15])
}

/// Column indices of the non-zero entries per row, at most `max_prefs_per_row` of them chosen
/// via reservoir sampling.
fn downsample(
    matrix: &SparseMatrix,
    max_prefs_per_row: usize,
    rng: &mut XorShiftRng,
) -> Vec<Vec<u32>> {

    matrix.rows()
        .map(|(_, row)| {
            let mut columns: Vec<u32> = row.iter()
                .filter(|(_, value)| **value > 0.0)
                .map(|(column, _)| *column)
                .collect();

            columns.sort_unstable();

            if columns.len() <= max_prefs_per_row {
                return columns;
            }

            let mut sample = columns[..max_prefs_per_row].to_vec();

            for (num_seen, column) in columns.iter().enumerate().skip(max_prefs_per_row) {
                let k: usize = rng.gen_range(0, num_seen + 1);
                if k < max_prefs_per_row {
                    sample[k] = *column;
                }
            }

            sample
        })
        .collect()
}

fn interaction_counts(samples: &[Vec<u32>], num_items: usize) -> DenseVector {
    let mut counts = types::new_dense_vector(num_items);
    for history in samples {
        for item in history {
            counts[*item as usize] += 1;
        }
    }
    counts
}

fn self_cooccurrences(samples: &[Vec<u32>], num_items: usize) -> CooccurrenceCounts {

    let mut c: CooccurrenceCounts =
        vec![FnvHashMap::with_capacity_and_hasher(10, Default::default()); num_items];

    for history in samples {
        for item in history {
            for other_item in history {
                if item != other_item {
                    *c[*item as usize].entry(*other_item).or_insert(0) += 1;
                }
            }
        }
    }

    c
}

fn cross_cooccurrences(
    samples_of_a: &[Vec<u32>],
    samples_of_b: &[Vec<u32>],
    num_items: usize,
) -> CooccurrenceCounts {

    let mut d: CooccurrenceCounts =
        vec![FnvHashMap::with_capacity_and_hasher(10, Default::default()); num_items];

    for (history_a, history_b) in samples_of_a.iter().zip(samples_of_b.iter()) {
        for item in history_a {
            for other_item in history_b {
                *d[*item as usize].entry(*other_item).or_insert(0) += 1;
            }
        }
    }

    d
}

#[allow(clippy::too_many_arguments)]
fn rescore_all(
    pool: &Pool,
    cooccurrences: &CooccurrenceCounts,
    item_interaction_counts: &DenseVector,
    other_interaction_counts: &DenseVector,
    num_rows: u64,
    k: usize,
    exclude_self: bool,
    num_other_items: usize,
) -> SparseMatrix {

    let indicators: Vec<Mutex<BinaryHeap<ScoredItem>>> = cooccurrences.iter()
        .map(|_| Mutex::new(BinaryHeap::with_capacity(k)))
        .collect();

    pool.scoped(|scope| {
        for (item, row) in cooccurrences.iter().enumerate() {

            if row.is_empty() {
                continue;
            }

            let indicators_for_item = &indicators[item];

            scope.execute(move || {
                rescore(
                    item as u32,
                    row,
                    item_interaction_counts,
                    other_interaction_counts,
                    num_rows,
                    indicators_for_item,
                    k,
                    exclude_self,
                )
            });
        }
    });

    let mut similarities = SparseMatrix::new(cooccurrences.len(), num_other_items);

    for (item, entry) in indicators.into_iter().enumerate() {
        let heap = entry.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        for scored_item in heap.into_vec() {
            similarities.set(item as u32, scored_item.item, scored_item.score);
        }
    }

    similarities
}

#[allow(clippy::too_many_arguments)]
fn rescore(
    item: u32,
    cooccurrence_counts: &FnvHashMap<u32, u32>,
    item_interaction_counts: &DenseVector,
    other_interaction_counts: &DenseVector,
    num_rows: u64,
    indicators: &Mutex<BinaryHeap<ScoredItem>>,
    k: usize,
    exclude_self: bool,
) {

    let mut indicators_for_item = indicators.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    indicators_for_item.clear();

    for (other_item, num_cooccurrences) in cooccurrence_counts.iter() {

        if exclude_self && *other_item == item {
            continue;
        }

        let k11 = *num_cooccurrences as u64;
        let k12 = (item_interaction_counts[item as usize] as u64).saturating_sub(k11);
        let k21 = (other_interaction_counts[*other_item as usize] as u64).saturating_sub(k11);
        let k22 = num_rows.saturating_sub(k11 + k12 + k21);

        let llr_score = llr::log_likelihood_ratio(k11, k12, k21, k22);

        // Independent items carry no evidence, they must not take up one of the k slots
        if llr_score <= 0.0 {
            continue;
        }

        let scored_item = ScoredItem { item: *other_item, score: llr_score };

        if indicators_for_item.len() < k {
            indicators_for_item.push(scored_item);
        } else if let Some(mut top) = indicators_for_item.peek_mut() {
            if scored_item < *top {
                *top = scored_item;
            }
        }
    }
}
