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

//! Settings of a similarity computation. A `Config` is built once, validated once and then
//! handed by reference to the components of a run.

use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_MAX_PREFS: usize = 500;
pub const DEFAULT_MAX_SIMILARITIES_PER_ITEM: usize = 100;
pub const DEFAULT_SEED: u64 = 0xCAFE_F00D;

/// Positions of the fields of an input line, and the byte separating them.
#[derive(Clone, Debug, PartialEq)]
pub struct InputSchema {
    pub delimiter: u8,
    pub row_id_position: usize,
    pub column_id_position: usize,
    pub strength_position: Option<usize>,
    pub filter_position: Option<usize>,
}

impl Default for InputSchema {
    fn default() -> Self {
        InputSchema {
            delimiter: b'\t',
            row_id_position: 0,
            column_id_position: 1,
            strength_position: None,
            filter_position: None,
        }
    }
}

impl InputSchema {

    /// Minimum number of fields a line needs to carry all configured positions.
    pub fn required_fields(&self) -> usize {
        let positions = [
            Some(self.row_id_position),
            Some(self.column_id_position),
            self.strength_position,
            self.filter_position,
        ];

        positions.iter().filter_map(|position| *position).max().unwrap_or(0) + 1
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("row id", Some(self.row_id_position)),
            ("column id", Some(self.column_id_position)),
            ("strength", self.strength_position),
            ("filter", self.filter_position),
        ];

        for (n, (name_a, position_a)) in named.iter().enumerate() {
            for (name_b, position_b) in named.iter().skip(n + 1) {
                if let (Some(a), Some(b)) = (position_a, position_b) {
                    if a == b {
                        return Err(ConfigError::PositionClash(*name_a, *name_b, *a));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Parses an input delimiter given on the command line. Accepts any single-byte character, as
/// well as `\t` and `tab` for tabs.
pub fn parse_delimiter(raw: &str) -> Result<u8, ConfigError> {
    match raw {
        "\\t" | "tab" => Ok(b'\t'),
        _ if raw.len() == 1 => Ok(raw.as_bytes()[0]),
        _ => Err(ConfigError::InvalidDelimiter(raw.to_owned())),
    }
}

/// Replaces the escapes `\t` and `\n` in output delimiters given on the command line.
pub fn unescape_delimiter(raw: &str) -> String {
    raw.replace("\\t", "\t").replace("\\n", "\n")
}

/// Tag values selecting the primary and, optionally, the secondary dataset from the same input.
#[derive(Clone, Debug, PartialEq)]
pub struct TagFilter {
    pub primary: String,
    pub secondary: Option<String>,
}

/// Where the secondary dataset of a cross-similarity computation comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum SecondarySource<'a> {
    None,
    Input(&'a [PathBuf]),
    Filter(&'a str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputFormat {
    pub row_key_delimiter: String,
    pub column_id_strength_delimiter: String,
    pub tuple_delimiter: String,
    pub omit_strength: bool,
    pub json: bool,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat {
            row_key_delimiter: "\t".to_owned(),
            column_id_strength_delimiter: ":".to_owned(),
            tuple_delimiter: " ".to_owned(),
            omit_strength: false,
            json: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub input: Vec<PathBuf>,
    pub secondary_input: Option<Vec<PathBuf>>,
    pub output: PathBuf,
    pub schema: InputSchema,
    pub filter: Option<TagFilter>,
    pub output_format: OutputFormat,
    pub max_prefs: usize,
    pub max_similarities_per_item: usize,
    pub seed: u64,
    pub write_input_matrices: bool,
    pub num_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: Vec::new(),
            secondary_input: None,
            output: PathBuf::from("."),
            schema: InputSchema::default(),
            filter: None,
            output_format: OutputFormat::default(),
            max_prefs: DEFAULT_MAX_PREFS,
            max_similarities_per_item: DEFAULT_MAX_SIMILARITIES_PER_ITEM,
            seed: DEFAULT_SEED,
            write_input_matrices: false,
            num_threads: num_cpus::get(),
        }
    }
}

impl Config {

    /// Checks all option values, must pass before any input is read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.is_empty() {
            return Err(ConfigError::MissingInput);
        }

        if self.max_prefs == 0 {
            return Err(ConfigError::NonPositiveMaxPrefs);
        }

        if self.max_similarities_per_item == 0 {
            return Err(ConfigError::NonPositiveMaxSimilarities);
        }

        if self.num_threads == 0 {
            return Err(ConfigError::NonPositiveThreads);
        }

        self.schema.validate()?;

        if self.filter.is_some() != self.schema.filter_position.is_some() {
            return Err(ConfigError::IncompleteFilter);
        }

        if self.filter.is_some() && self.secondary_input.is_some() {
            return Err(ConfigError::AmbiguousSecondary);
        }

        Ok(())
    }

    /// The tag primary lines must carry, if any.
    pub fn primary_tag(&self) -> Option<&str> {
        self.filter.as_ref().map(|filter| filter.primary.as_str())
    }

    pub fn secondary_source(&self) -> SecondarySource {
        if let Some(paths) = &self.secondary_input {
            return SecondarySource::Input(paths);
        }

        match self.filter.as_ref().and_then(|filter| filter.secondary.as_ref()) {
            Some(tag) => SecondarySource::Filter(tag),
            None => SecondarySource::None,
        }
    }
}
