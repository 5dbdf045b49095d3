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

use std::fs::File;
use std::io;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use log::{debug, info, warn};
use scoped_pool::Pool;

use crate::config::InputSchema;
use crate::error::{Error, Result};
use crate::index::SharedIdentifierIndex;
use crate::utils;

/// A single observed interaction, with its identifiers already resolved to indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interaction {
    pub row: u32,
    pub column: u32,
    pub strength: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReadStats {
    pub lines: u64,
    pub malformed: u64,
    pub filtered: u64,
}

impl AddAssign for ReadStats {
    fn add_assign(&mut self, other: ReadStats) {
        self.lines += other.lines;
        self.malformed += other.malformed;
        self.filtered += other.filtered;
    }
}

/// Outcome of looking at a single line, before any identifier gets an index.
#[derive(Debug, PartialEq)]
enum Line<'r> {
    Accepted { row_id: &'r str, column_id: &'r str, strength: f64 },
    Filtered,
    Malformed(String),
}

/// Reads interaction tuples from delimited text. Only accepted lines allocate indices, lines
/// dropped by the tag filter or skipped as malformed never show up in the identifier indices.
pub struct TupleReader<'a> {
    schema: &'a InputSchema,
    expected_tag: Option<&'a str>,
    num_threads: usize,
}

impl<'a> TupleReader<'a> {

    pub fn new(schema: &'a InputSchema, expected_tag: Option<&'a str>) -> Self {
        TupleReader { schema, expected_tag, num_threads: 1 }
    }

    /// Files of a read are parsed concurrently with up to `num_threads` threads.
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    /// Reads all files found at `locations`, in order. Missing locations contribute no data,
    /// failures to read an existing file abort the read.
    pub fn read(
        &self,
        locations: &[PathBuf],
        rows: &SharedIdentifierIndex,
        columns: &SharedIdentifierIndex,
    ) -> Result<Vec<Interaction>> {

        let read_start = Instant::now();
        let files = utils::input_files(locations)?;

        let results = if files.len() > 1 && self.num_threads > 1 {
            self.read_concurrently(&files, rows, columns)
        } else {
            files.iter().map(|file| self.read_file(file, rows, columns)).collect()
        };

        let mut interactions = Vec::new();
        let mut stats = ReadStats::default();

        for result in results {
            let (interactions_of_file, stats_of_file) = result?;
            interactions.extend(interactions_of_file);
            stats += stats_of_file;
        }

        info!(
            "Read {} lines from {} files in {}ms: {} interactions, {} malformed, {} filtered",
            stats.lines,
            files.len(),
            utils::to_millis(read_start.elapsed()),
            interactions.len(),
            stats.malformed,
            stats.filtered,
        );

        Ok(interactions)
    }

    fn read_concurrently(
        &self,
        files: &[PathBuf],
        rows: &SharedIdentifierIndex,
        columns: &SharedIdentifierIndex,
    ) -> Vec<Result<(Vec<Interaction>, ReadStats)>> {

        let slots: Vec<Mutex<Option<Result<(Vec<Interaction>, ReadStats)>>>> =
            files.iter().map(|_| Mutex::new(None)).collect();

        let pool = Pool::new(self.num_threads.min(files.len()));

        pool.scoped(|scope| {
            for (file, slot) in files.iter().zip(slots.iter()) {
                scope.execute(move || {
                    let result = self.read_file(file, rows, columns);
                    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(result);
                });
            }
        });

        pool.shutdown();

        slots.into_iter()
            .zip(files.iter())
            .map(|(slot, file)| {
                slot.into_inner()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .unwrap_or_else(|| Err(Error::Read {
                        path: file.clone(),
                        source: io::Error::new(io::ErrorKind::Other, "parsing task did not finish"),
                    }))
            })
            .collect()
    }

    fn read_file(
        &self,
        file: &Path,
        rows: &SharedIdentifierIndex,
        columns: &SharedIdentifierIndex,
    ) -> Result<(Vec<Interaction>, ReadStats)> {

        debug!("Reading interactions from {}", file.display());

        let source = File::open(file)
            .map_err(|source| Error::Read { path: file.to_path_buf(), source })?;

        self.read_from(source, file, rows, columns)
    }

    /// Reads interactions from any source of delimited lines, `name` is only used for messages.
    pub fn read_from<R: io::Read>(
        &self,
        source: R,
        name: &Path,
        rows: &SharedIdentifierIndex,
        columns: &SharedIdentifierIndex,
    ) -> Result<(Vec<Interaction>, ReadStats)> {

        // No quoting, identifiers have to reach the index exactly as they appear in the input.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .delimiter(self.schema.delimiter)
            .from_reader(source);

        let mut interactions = Vec::new();
        let mut stats = ReadStats::default();
        let mut record = csv::ByteRecord::new();

        while reader.read_byte_record(&mut record)
            .map_err(|source| Error::Parse { path: name.to_path_buf(), source })? {

            stats.lines += 1;

            match self.parse(&record) {
                Line::Accepted { row_id, column_id, strength } => {
                    interactions.push(Interaction {
                        row: rows.index_of(row_id)?,
                        column: columns.index_of(column_id)?,
                        strength,
                    });
                },
                Line::Filtered => stats.filtered += 1,
                Line::Malformed(reason) => {
                    stats.malformed += 1;
                    let line = record.position().map(|position| position.line()).unwrap_or(0);
                    warn!("Skipping line {} of {}: {}", line, name.display(), reason);
                },
            }
        }

        Ok((interactions, stats))
    }

    fn parse<'r>(&self, record: &'r csv::ByteRecord) -> Line<'r> {

        let required = self.schema.required_fields();
        if record.len() < required {
            return Line::Malformed(
                format!("expected at least {} fields, found {}", required, record.len()));
        }

        let field = move |position: usize| -> std::result::Result<&'r str, String> {
            std::str::from_utf8(&record[position])
                .map_err(|_| format!("field {} is not valid UTF-8", position))
        };

        if let (Some(position), Some(expected)) = (self.schema.filter_position, self.expected_tag) {
            match field(position) {
                Ok(tag) if tag == expected => {},
                Ok(_) => return Line::Filtered,
                Err(reason) => return Line::Malformed(reason),
            }
        }

        let row_id = match field(self.schema.row_id_position) {
            Ok(row_id) => row_id,
            Err(reason) => return Line::Malformed(reason),
        };

        let column_id = match field(self.schema.column_id_position) {
            Ok(column_id) => column_id,
            Err(reason) => return Line::Malformed(reason),
        };

        if row_id.is_empty() || column_id.is_empty() {
            return Line::Malformed("empty identifier".to_owned());
        }

        let strength = match self.schema.strength_position {
            Some(position) => match field(position).map(|raw| raw.trim().parse::<f64>()) {
                Ok(Ok(strength)) if strength.is_finite() && strength >= 0.0 => strength,
                Ok(_) => return Line::Malformed(
                    format!("unusable strength '{}'", String::from_utf8_lossy(&record[position]))),
                Err(reason) => return Line::Malformed(reason),
            },
            None => 1.0,
        };

        Line::Accepted { row_id, column_id, strength }
    }
}
