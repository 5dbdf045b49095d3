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

use std::fs;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::info;
use serde_derive::Serialize;

use crate::config::OutputFormat;
use crate::error::{Error, Result};
use crate::index::IdentifierIndex;
use crate::types::SparseMatrix;

pub const SIMILARITY_MATRIX: &str = "similarity-matrix";
pub const CROSS_SIMILARITY_MATRIX: &str = "cross-similarity-matrix";
pub const PRIMARY_INTERACTIONS: &str = "primary-interactions";
pub const SECONDARY_INTERACTIONS: &str = "secondary-interactions";

/// Outputs are assembled here and moved next to it once all of them are complete
pub const STAGING_DIRECTORY: &str = "_temporary";

const PART_FILE: &str = "part-00000";

/// Struct used for JSON serialization of a row. Field names will be used in JSON.
#[derive(Serialize)]
struct Row<'a> {
    id: &'a str,
    similar: Vec<Entry<'a>>,
}

#[derive(Serialize)]
struct Entry<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

/// A result matrix together with the identifiers of its rows and columns, to be written into
/// its own directory.
pub struct MatrixOutput<'a> {
    pub name: &'static str,
    pub matrix: &'a SparseMatrix,
    pub row_ids: &'a IdentifierIndex,
    pub column_ids: &'a IdentifierIndex,
}

impl<'a> MatrixOutput<'a> {

    /// Writes one line per non-empty row to `<output>/<name>/part-00000`, using the original
    /// identifiers from the input. Entries of a row are ordered by descending value.
    pub fn write(&self, output: &Path, format: &OutputFormat) -> Result<PathBuf> {

        let directory = output.join(self.name);
        fs::create_dir_all(&directory)
            .map_err(|source| Error::Write { path: directory.clone(), source })?;

        let path = directory.join(PART_FILE);
        let write_error = |source| Error::Write { path: path.clone(), source };

        let mut out = BufWriter::new(File::create(&path).map_err(write_error)?);
        let mut num_lines = 0;

        for (row, _) in self.matrix.rows() {

            let ranked = self.matrix.ranked_row(row);
            if ranked.is_empty() {
                continue;
            }

            let row_id = self.row_ids.identifier_at(row)?;

            let line = if format.json {
                json_line(row_id, &ranked, self.column_ids, format)?
            } else {
                text_line(row_id, &ranked, self.column_ids, format)?
            };

            writeln!(out, "{}", line).map_err(write_error)?;

            num_lines += 1;
        }

        out.flush().map_err(write_error)?;

        info!("Wrote {} rows to {}", num_lines, path.display());

        Ok(directory)
    }
}

fn text_line(
    row_id: &str,
    ranked: &[(u32, f64)],
    column_ids: &IdentifierIndex,
    format: &OutputFormat,
) -> Result<String> {

    let mut line = String::with_capacity(row_id.len() + 16 * ranked.len());
    line.push_str(row_id);
    line.push_str(&format.row_key_delimiter);

    for (position, (column, value)) in ranked.iter().enumerate() {
        if position > 0 {
            line.push_str(&format.tuple_delimiter);
        }

        line.push_str(column_ids.identifier_at(*column)?);

        if !format.omit_strength {
            line.push_str(&format.column_id_strength_delimiter);
            line.push_str(&value.to_string());
        }
    }

    Ok(line)
}

fn json_line(
    row_id: &str,
    ranked: &[(u32, f64)],
    column_ids: &IdentifierIndex,
    format: &OutputFormat,
) -> Result<String> {

    let mut similar = Vec::with_capacity(ranked.len());
    for (column, value) in ranked {
        similar.push(Entry {
            id: column_ids.identifier_at(*column)?,
            score: if format.omit_strength { None } else { Some(*value) },
        });
    }

    Ok(serde_json::to_string(&Row { id: row_id, similar })?)
}
