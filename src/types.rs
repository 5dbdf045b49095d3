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

use fnv::FnvHashMap;

use crate::error::{Error, Result};

pub type DenseVector = Vec<u32>;

pub type SparseVector = FnvHashMap<u32, f64>;

pub fn new_dense_vector(dimensions: usize) -> DenseVector {
    vec![0; dimensions]
}

pub fn new_sparse_vector(capacity: usize) -> SparseVector {
    FnvHashMap::with_capacity_and_hasher(capacity, Default::default())
}

/// Row-oriented sparse matrix with non-negative weights. The number of columns is tracked
/// explicitly, as trailing columns may be empty. Cells holding zero are never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    rows: Vec<SparseVector>,
    num_columns: usize,
}

impl SparseMatrix {

    pub fn new(num_rows: usize, num_columns: usize) -> Self {
        SparseMatrix { rows: vec![new_sparse_vector(0); num_rows], num_columns }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn num_non_zeros(&self) -> usize {
        self.rows.iter().map(|row| row.len()).sum()
    }

    /// Adds `value` to the cell at (`row`, `column`), repeated additions are summed up.
    ///
    /// Panics if the cell lies outside of the matrix, callers size the matrix from the
    /// identifier indices they resolved the coordinates with.
    pub fn add(&mut self, row: u32, column: u32, value: f64) {
        let sum = self.get(row, column).unwrap_or(0.0) + value;
        self.set(row, column, sum);
    }

    /// Overwrites the cell at (`row`, `column`), setting it to zero removes the entry.
    pub fn set(&mut self, row: u32, column: u32, value: f64) {
        assert!((column as usize) < self.num_columns, "column {} out of bounds", column);
        if value == 0.0 {
            self.rows[row as usize].remove(&column);
        } else {
            self.rows[row as usize].insert(column, value);
        }
    }

    pub fn get(&self, row: u32, column: u32) -> Option<f64> {
        self.rows.get(row as usize).and_then(|entries| entries.get(&column).cloned())
    }

    pub fn row(&self, row: u32) -> &SparseVector {
        &self.rows[row as usize]
    }

    pub fn rows(&self) -> impl Iterator<Item=(u32, &SparseVector)> {
        self.rows.iter().enumerate().map(|(index, row)| (index as u32, row))
    }

    /// Entries of a row sorted by descending value, ties broken by column index.
    pub fn ranked_row(&self, row: u32) -> Vec<(u32, f64)> {
        let mut entries: Vec<(u32, f64)> = self.rows[row as usize].iter()
            .map(|(column, value)| (*column, *value))
            .collect();

        entries.sort_by(|(column_a, value_a), (column_b, value_b)| {
            value_b.partial_cmp(value_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(column_a.cmp(column_b))
        });

        entries
    }

    /// Returns a copy with `num_rows` rows, the additional rows are empty. Existing rows and
    /// their entries are left untouched, shrinking is rejected.
    pub fn with_num_rows(&self, num_rows: usize) -> Result<SparseMatrix> {
        if num_rows < self.num_rows() {
            return Err(Error::CardinalityShrink { current: self.num_rows(), requested: num_rows });
        }

        let mut rows = Vec::with_capacity(num_rows);
        rows.extend(self.rows.iter().cloned());
        rows.resize(num_rows, new_sparse_vector(0));

        Ok(SparseMatrix { rows, num_columns: self.num_columns })
    }
}
