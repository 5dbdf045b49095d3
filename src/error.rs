/*
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

//! Error types of the crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors which abort a similarity computation.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration validation failed
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// An index was looked up which was never assigned
    #[error("Index {index} out of range for identifier index of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// More distinct identifiers than `u32` indices
    #[error("Identifier index of size {size} cannot allocate further indices")]
    IdentifierSpaceExhausted { size: usize },

    /// A cardinality adjustment would drop rows
    #[error("Cannot shrink row cardinality from {current} to {requested}")]
    CardinalityShrink { current: usize, requested: usize },

    /// Matrix dimensions disagree with the identifier indices of a dataset
    #[error("Matrix of shape {rows}x{columns} does not match identifier indices of size \
        {row_ids}x{column_ids}")]
    ShapeMismatch { rows: usize, columns: usize, row_ids: usize, column_ids: usize },

    /// The row identifier spaces of two datasets do not agree
    #[error("Datasets are misaligned: {0}")]
    Misaligned(String),

    /// The similarity kernel failed, we pass its error through untouched
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("Similarity kernel returned {returned} matrices, expected {expected}")]
    KernelResultCount { expected: usize, returned: usize },

    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: csv::Error },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Rejected option values, detected before any input is read.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no input location given")]
    MissingInput,

    #[error("maxPrefs must be greater than zero")]
    NonPositiveMaxPrefs,

    #[error("maxSimilaritiesPerItem must be greater than zero")]
    NonPositiveMaxSimilarities,

    #[error("the number of threads must be greater than zero")]
    NonPositiveThreads,

    #[error("fields '{0}' and '{1}' are configured at the same position {2}")]
    PositionClash(&'static str, &'static str, usize),

    #[error("a filter tag requires a filter position and vice versa")]
    IncompleteFilter,

    #[error("a second input and a filter cannot be combined, choose one way to define the \
        secondary dataset")]
    AmbiguousSecondary,

    #[error("delimiter '{0}' is not a single-byte character")]
    InvalidDelimiter(String),
}

/// Failures of a similarity kernel.
#[derive(Debug, Error, PartialEq)]
pub enum KernelError {
    #[error("only a single secondary matrix is supported, got {0}")]
    UnsupportedSecondaryCount(usize),

    #[error("primary matrix has {primary} rows but secondary matrix has {secondary} rows")]
    RowCardinalityMismatch { primary: usize, secondary: usize },
}
