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

use std::env;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use getopts::{Matches, Options};
use log::info;

use cooccur::config::{self, Config, InputSchema, OutputFormat, TagFilter};
use cooccur::RunOutcome;

fn main() {

    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let opts = options();

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    let config = match config_from(&matches) {
        Ok(config) => config,
        Err(hint) => return print_usage_and_exit(&program, opts, Some(&hint)),
    };

    if let Err(failure) = config.validate() {
        return print_usage_and_exit(&program, opts, Some(&failure.to_string()));
    }

    match cooccur::item_similarities(&config) {
        Ok(RunOutcome::NoInput) => {
            eprintln!("No interactions found in {:?}, nothing to do.", config.input);
        },
        Ok(RunOutcome::Completed { written }) => {
            for directory in written {
                info!("Results written to {}", directory.display());
            }
        },
        Err(failure) => {
            eprintln!("Error: {}", failure);
            process::exit(1);
        },
    }
}

fn options() -> Options {

    let mut opts = Options::new();

    opts.optopt("i", "input", "Input locations (required), comma separated. Each location is a \
        file or a directory of files with one interaction per line.", "PATHS");
    opts.optopt("", "input2", "Input locations of secondary interactions (optional). Enables \
        the computation of cross-similarities.", "PATHS");
    opts.optopt("o", "output", "Output directory (required).", "PATH");

    opts.optopt("", "in-delim", "Field delimiter of the input (optional, defaults to tab).",
        "CHAR");
    opts.optopt("", "row-id-column", "Position of the user id field (optional, defaults to 0).",
        "NUMBER");
    opts.optopt("", "item-id-column", "Position of the item id field (optional, defaults to 1).",
        "NUMBER");
    opts.optopt("", "strength-column", "Position of the strength field (optional, every \
        interaction counts as 1 by default).", "NUMBER");
    opts.optopt("", "filter-column", "Position of the field holding the kind of interaction \
        (optional).", "NUMBER");
    opts.optopt("", "filter1", "Kind of interaction of the primary dataset, required together \
        with --filter-column.", "TAG");
    opts.optopt("", "filter2", "Kind of interaction of the secondary dataset (optional). Enables \
        the computation of cross-similarities.", "TAG");

    opts.optopt("", "row-key-delim", "Delimiter between the item id and its similar items in the \
        output (optional, defaults to tab).", "STRING");
    opts.optopt("", "column-strength-delim", "Delimiter between a similar item and its score in \
        the output (optional, defaults to ':').", "STRING");
    opts.optopt("", "tuple-delim", "Delimiter between similar items in the output (optional, \
        defaults to ' ').", "STRING");
    opts.optflag("", "omit-strength", "Do not write scores to the output.");
    opts.optflag("", "json", "Write JSON lines instead of delimited text.");

    opts.optopt("m", "max-prefs", "Maximum number of interactions to account for per user \
        (optional, defaults to 500).", "NUMBER");
    opts.optopt("n", "max-similarities-per-item", "Number of similar items to compute per item \
        (optional, defaults to 100).", "NUMBER");
    opts.optopt("", "seed", "Seed for downsampling (optional).", "NUMBER");
    opts.optopt("t", "threads", "Number of threads to use (optional, defaults to the number of \
        CPUs).", "NUMBER");
    opts.optflag("", "write-input-matrices", "Also write the interaction matrices read from the \
        input, for debugging.");
    opts.optflag("h", "help", "Print this help menu");

    opts
}

fn print_usage_and_exit(
    program: &str,
    opts: Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));

    process::exit(if hint.is_some() { 2 } else { 0 });
}

fn config_from(matches: &Matches) -> Result<Config, String> {

    let defaults = Config::default();

    let input = match matches.opt_str("i") {
        Some(paths) => locations(&paths),
        None => return Err("Please specify the input via --input.".to_owned()),
    };

    let output = match matches.opt_str("o") {
        Some(path) => PathBuf::from(path),
        None => return Err("Please specify an output directory via --output.".to_owned()),
    };

    let delimiter = match matches.opt_str("in-delim") {
        Some(raw) => config::parse_delimiter(&raw).map_err(|failure| failure.to_string())?,
        None => b'\t',
    };

    let schema = InputSchema {
        delimiter,
        row_id_position: number(matches, "row-id-column")?.unwrap_or(0),
        column_id_position: number(matches, "item-id-column")?.unwrap_or(1),
        strength_position: number(matches, "strength-column")?,
        filter_position: number(matches, "filter-column")?,
    };

    let filter = match (matches.opt_str("filter1"), matches.opt_str("filter2")) {
        (Some(primary), secondary) => Some(TagFilter { primary, secondary }),
        (None, Some(_)) => return Err("--filter2 requires --filter1.".to_owned()),
        (None, None) => None,
    };

    let format_defaults = OutputFormat::default();

    let output_format = OutputFormat {
        row_key_delimiter: delimiter_option(matches, "row-key-delim")
            .unwrap_or(format_defaults.row_key_delimiter),
        column_id_strength_delimiter: delimiter_option(matches, "column-strength-delim")
            .unwrap_or(format_defaults.column_id_strength_delimiter),
        tuple_delimiter: delimiter_option(matches, "tuple-delim")
            .unwrap_or(format_defaults.tuple_delimiter),
        omit_strength: matches.opt_present("omit-strength"),
        json: matches.opt_present("json"),
    };

    Ok(Config {
        input,
        secondary_input: matches.opt_str("input2").map(|paths| locations(&paths)),
        output,
        schema,
        filter,
        output_format,
        max_prefs: number(matches, "max-prefs")?.unwrap_or(defaults.max_prefs),
        max_similarities_per_item: number(matches, "max-similarities-per-item")?
            .unwrap_or(defaults.max_similarities_per_item),
        seed: number(matches, "seed")?.unwrap_or(defaults.seed),
        write_input_matrices: matches.opt_present("write-input-matrices"),
        num_threads: number(matches, "threads")?.unwrap_or(defaults.num_threads),
    })
}

fn locations(paths: &str) -> Vec<PathBuf> {
    paths.split(',')
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn delimiter_option(matches: &Matches, name: &str) -> Option<String> {
    matches.opt_str(name).map(|raw| config::unescape_delimiter(&raw))
}

fn number<T>(matches: &Matches, name: &str) -> Result<Option<T>, String>
    where T: FromStr, T::Err: ToString {

    matches.opt_get::<T>(name)
        .map_err(|failure| format!("Problem with option '{}': {}", name, failure.to_string()))
}
