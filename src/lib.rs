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

//! Item-to-item similarities from user-item interactions, scored with the loglikelihood ratio of
//! item co-occurrences. Optionally computes cross-similarities between the items of a primary
//! and a secondary kind of interaction (e.g. purchases and views) of the same users.

mod llr;

pub mod align;
pub mod config;
pub mod dataset;
pub mod error;
pub mod index;
pub mod io;
pub mod kernel;
pub mod orchestrator;
pub mod reader;
pub mod types;
pub mod utils;

pub use crate::config::Config;
pub use crate::dataset::IndexedDataset;
pub use crate::error::{Error, Result};
pub use crate::index::IdentifierIndex;
pub use crate::kernel::{CooccurrenceKernel, SimilarityKernel};
pub use crate::orchestrator::{RunOutcome, SimilarityJob};

/// Computes and writes the similarities described by `config` with the loglikelihood ratio
/// co-occurrence kernel, using `config.num_threads` threads.
pub fn item_similarities(config: &Config) -> Result<RunOutcome> {
    SimilarityJob::new(config, CooccurrenceKernel::new(config.num_threads)).run()
}
