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

use std::path::PathBuf;

use log::debug;

use crate::error::{Error, Result};
use crate::index::{IdentifierIndex, SharedIdentifierIndex};
use crate::reader::{Interaction, TupleReader};
use crate::types::SparseMatrix;

/// An interaction matrix together with the identifier indices which give its rows and columns
/// their meaning. The shape of the matrix always equals the sizes of the two indices.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedDataset {
    matrix: SparseMatrix,
    row_ids: IdentifierIndex,
    column_ids: IdentifierIndex,
}

impl IndexedDataset {

    pub fn new(
        matrix: SparseMatrix,
        row_ids: IdentifierIndex,
        column_ids: IdentifierIndex,
    ) -> Result<Self> {

        if matrix.num_rows() != row_ids.size() || matrix.num_columns() != column_ids.size() {
            return Err(Error::ShapeMismatch {
                rows: matrix.num_rows(),
                columns: matrix.num_columns(),
                row_ids: row_ids.size(),
                column_ids: column_ids.size(),
            });
        }

        Ok(IndexedDataset { matrix, row_ids, column_ids })
    }

    /// Accumulates interactions into a matrix shaped after the finished indices. Strengths of
    /// repeated (row, column) pairs are summed up.
    pub fn from_interactions(
        interactions: &[Interaction],
        row_ids: IdentifierIndex,
        column_ids: IdentifierIndex,
    ) -> Result<Self> {

        let mut matrix = SparseMatrix::new(row_ids.size(), column_ids.size());

        for interaction in interactions {
            if interaction.row as usize >= row_ids.size() {
                return Err(Error::IndexOutOfRange {
                    index: interaction.row as usize,
                    size: row_ids.size(),
                });
            }
            if interaction.column as usize >= column_ids.size() {
                return Err(Error::IndexOutOfRange {
                    index: interaction.column as usize,
                    size: column_ids.size(),
                });
            }

            matrix.add(interaction.row, interaction.column, interaction.strength);
        }

        IndexedDataset::new(matrix, row_ids, column_ids)
    }

    /// Reads a dataset from `locations`. With `existing_row_ids`, the row index starts out as a
    /// copy of those, so rows already known from an earlier read keep their index. The column
    /// index always starts out empty.
    pub fn read(
        reader: &TupleReader,
        locations: &[PathBuf],
        existing_row_ids: Option<&IdentifierIndex>,
    ) -> Result<Self> {

        let row_ids = match existing_row_ids {
            Some(existing) => IdentifierIndex::seeded_from(existing),
            None => IdentifierIndex::new(),
        };

        let rows = SharedIdentifierIndex::new(row_ids);
        let columns = SharedIdentifierIndex::default();

        let interactions = reader.read(locations, &rows, &columns)?;

        // Both indices are final from here on, the matrix is shaped after them
        let dataset =
            IndexedDataset::from_interactions(&interactions, rows.into_inner(), columns.into_inner())?;

        debug!(
            "Built dataset with {} rows, {} columns and {} non-zeros",
            dataset.num_rows(),
            dataset.num_columns(),
            dataset.matrix.num_non_zeros(),
        );

        Ok(dataset)
    }

    pub fn matrix(&self) -> &SparseMatrix {
        &self.matrix
    }

    pub fn row_ids(&self) -> &IdentifierIndex {
        &self.row_ids
    }

    pub fn column_ids(&self) -> &IdentifierIndex {
        &self.column_ids
    }

    pub fn num_rows(&self) -> usize {
        self.matrix.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.matrix.num_columns()
    }

    /// Returns a dataset with the rows named by `row_ids`, which must be this dataset's row
    /// index with zero or more identifiers appended. The entries and the column axis stay the
    /// same, the appended rows are empty.
    pub fn with_row_cardinality(&self, row_ids: &IdentifierIndex) -> Result<IndexedDataset> {

        if row_ids.size() < self.num_rows() {
            return Err(Error::CardinalityShrink {
                current: self.num_rows(),
                requested: row_ids.size(),
            });
        }

        if !self.row_ids.is_extended_by(row_ids) {
            return Err(Error::Misaligned(
                "new row index reassigns existing row identifiers".to_owned()));
        }

        let matrix = self.matrix.with_num_rows(row_ids.size())?;

        IndexedDataset::new(matrix, row_ids.clone(), self.column_ids.clone())
    }
}
