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
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};

use crate::align;
use crate::config::{Config, SecondarySource};
use crate::dataset::IndexedDataset;
use crate::error::{Error, Result};
use crate::io::{self, MatrixOutput};
use crate::kernel::SimilarityKernel;
use crate::reader::TupleReader;
use crate::types::SparseMatrix;
use crate::utils;

#[derive(Debug, PartialEq)]
pub enum RunOutcome {
    /// The primary input held no interactions, nothing was computed or written
    NoInput,
    /// Directories written, in the order self-similarity, cross-similarity, input matrices
    Completed { written: Vec<PathBuf> },
}

/// Drives a single similarity computation: reads and aligns the datasets, hands them to the
/// kernel and writes the results.
pub struct SimilarityJob<'a, K: SimilarityKernel> {
    config: &'a Config,
    kernel: K,
}

impl<'a, K: SimilarityKernel> SimilarityJob<'a, K> {

    pub fn new(config: &'a Config, kernel: K) -> Self {
        SimilarityJob { config, kernel }
    }

    pub fn run(&self) -> Result<RunOutcome> {

        self.config.validate()?;

        let start = Instant::now();

        let (primary, secondary) = match self.read_datasets()? {
            Some(datasets) => datasets,
            None => return Ok(RunOutcome::NoInput),
        };

        let secondaries: Vec<&SparseMatrix> = secondary.iter().map(|s| s.matrix()).collect();

        info!(
            "Computing similarities for {} items over {} rows ({} cross-similarity matrices)",
            primary.num_columns(),
            primary.num_rows(),
            secondaries.len(),
        );

        let similarities = self.kernel.cooccurrences(
            primary.matrix(),
            self.config.seed,
            self.config.max_similarities_per_item,
            self.config.max_prefs,
            &secondaries,
        )?;

        if similarities.len() != 1 + secondaries.len() {
            return Err(Error::KernelResultCount {
                expected: 1 + secondaries.len(),
                returned: similarities.len(),
            });
        }

        // Rows of all results are the items of the primary dataset, columns are the items of
        // the primary dataset for self-similarities and of the secondary one for cross-similarities
        let mut outputs = vec![MatrixOutput {
            name: io::SIMILARITY_MATRIX,
            matrix: &similarities[0],
            row_ids: primary.column_ids(),
            column_ids: primary.column_ids(),
        }];

        if let (Some(secondary), Some(cross_similarities)) = (&secondary, similarities.get(1)) {
            outputs.push(MatrixOutput {
                name: io::CROSS_SIMILARITY_MATRIX,
                matrix: cross_similarities,
                row_ids: primary.column_ids(),
                column_ids: secondary.column_ids(),
            });
        }

        if self.config.write_input_matrices {
            outputs.push(input_output(io::PRIMARY_INTERACTIONS, &primary));
            if let Some(secondary) = &secondary {
                outputs.push(input_output(io::SECONDARY_INTERACTIONS, secondary));
            }
        }

        for output in outputs.iter() {
            check_shape(output)?;
        }

        let written = self.write(&outputs, &self.config.output)?;

        info!("Finished in {}ms", utils::to_millis(start.elapsed()));

        Ok(RunOutcome::Completed { written })
    }

    /// Reads the primary dataset and, if configured, the secondary dataset aligned to it.
    /// Returns `None` if the primary input holds no interactions.
    pub fn read_datasets(&self) -> Result<Option<(IndexedDataset, Option<IndexedDataset>)>> {

        let config = self.config;

        info!("Reading primary interactions");
        let primary_reader = TupleReader::new(&config.schema, config.primary_tag())
            .with_threads(config.num_threads);
        let primary = IndexedDataset::read(&primary_reader, &config.input, None)?;

        if primary.num_rows() == 0 {
            warn!("Found no interactions in the primary input, there is nothing to compute");
            return Ok(None);
        }

        // The secondary dataset starts from the finished row index of the primary one
        let secondary = match config.secondary_source() {
            SecondarySource::None => None,
            SecondarySource::Input(locations) => {
                info!("Reading secondary interactions from the second input");
                let reader = TupleReader::new(&config.schema, None)
                    .with_threads(config.num_threads);
                Some(IndexedDataset::read(&reader, locations, Some(primary.row_ids()))?)
            },
            SecondarySource::Filter(tag) => {
                info!("Reading secondary interactions tagged '{}'", tag);
                let reader = TupleReader::new(&config.schema, Some(tag))
                    .with_threads(config.num_threads);
                Some(IndexedDataset::read(&reader, &config.input, Some(primary.row_ids()))?)
            },
        };

        match secondary {
            Some(secondary) => {
                let aligned = align::align(primary, secondary)?;
                Ok(Some((aligned.primary, Some(aligned.secondary))))
            },
            None => Ok(Some((primary, None))),
        }
    }

    /// Writes all outputs below a staging directory first and only moves them into `output`
    /// once every one of them was written completely.
    fn write(&self, outputs: &[MatrixOutput], output: &Path) -> Result<Vec<PathBuf>> {

        let staging = output.join(io::STAGING_DIRECTORY);

        let written = outputs.iter()
            .map(|matrix_output| matrix_output.write(&staging, &self.config.output_format))
            .collect::<Result<Vec<PathBuf>>>()
            .and_then(|staged| publish(outputs, &staged, output));

        if staging.exists() {
            if let Err(failure) = fs::remove_dir_all(&staging) {
                warn!("Unable to remove {}: {}", staging.display(), failure);
            }
        }

        written
    }
}

fn publish(outputs: &[MatrixOutput], staged: &[PathBuf], output: &Path) -> Result<Vec<PathBuf>> {
    outputs.iter()
        .zip(staged.iter())
        .map(|(matrix_output, staged_directory)| {
            let target = output.join(matrix_output.name);
            let write_error = |source| Error::Write { path: target.clone(), source };

            if target.exists() {
                fs::remove_dir_all(&target).map_err(write_error)?;
            }
            fs::rename(staged_directory, &target).map_err(write_error)?;

            Ok(target)
        })
        .collect()
}

fn input_output<'d>(name: &'static str, dataset: &'d IndexedDataset) -> MatrixOutput<'d> {
    MatrixOutput {
        name,
        matrix: dataset.matrix(),
        row_ids: dataset.row_ids(),
        column_ids: dataset.column_ids(),
    }
}

fn check_shape(output: &MatrixOutput) -> Result<()> {
    if output.matrix.num_rows() != output.row_ids.size() ||
        output.matrix.num_columns() != output.column_ids.size() {

        return Err(Error::ShapeMismatch {
            rows: output.matrix.num_rows(),
            columns: output.matrix.num_columns(),
            row_ids: output.row_ids.size(),
            column_ids: output.column_ids.size(),
        });
    }

    Ok(())
}


#[cfg(test)]
mod tests {

    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::{RunOutcome, SimilarityJob};
    use crate::config::{Config, InputSchema, TagFilter};
    use crate::error::{ConfigError, Error, KernelError};
    use crate::io;
    use crate::kernel::{CooccurrenceKernel, SimilarityKernel};
    use crate::types::SparseMatrix;

    /// Remembers the matrices it was invoked with and answers with empty similarity matrices.
    #[derive(Default)]
    struct RecordingKernel {
        calls: RefCell<Vec<(SparseMatrix, Vec<SparseMatrix>)>>,
    }

    impl SimilarityKernel for RecordingKernel {
        fn cooccurrences(
            &self,
            primary: &SparseMatrix,
            _seed: u64,
            _max_similarities_per_item: usize,
            _max_prefs_per_row: usize,
            secondaries: &[&SparseMatrix],
        ) -> Result<Vec<SparseMatrix>, KernelError> {

            self.calls.borrow_mut().push(
                (primary.clone(), secondaries.iter().map(|s| (*s).clone()).collect()));

            let mut results = vec![SparseMatrix::new(primary.num_columns(), primary.num_columns())];
            for secondary in secondaries {
                results.push(SparseMatrix::new(primary.num_columns(), secondary.num_columns()));
            }

            Ok(results)
        }
    }

    struct FailingKernel;

    impl SimilarityKernel for FailingKernel {
        fn cooccurrences(
            &self,
            _primary: &SparseMatrix,
            _seed: u64,
            _max_similarities_per_item: usize,
            _max_prefs_per_row: usize,
            _secondaries: &[&SparseMatrix],
        ) -> Result<Vec<SparseMatrix>, KernelError> {
            Err(KernelError::UnsupportedSecondaryCount(7))
        }
    }

    fn input_file(directory: &Path, name: &str, content: &str) -> PathBuf {
        let path = directory.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn single_dataset_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "input.csv", "u1,i1\nu1,i2\nu2,i1\n");
        let output = dir.path().join("out");

        let config = Config {
            input: vec![input],
            output: output.clone(),
            schema: InputSchema { delimiter: b',', ..InputSchema::default() },
            max_similarities_per_item: 10,
            num_threads: 1,
            ..Config::default()
        };

        let job = SimilarityJob::new(&config, RecordingKernel::default());

        let (primary, secondary) = job.read_datasets().unwrap().unwrap();
        assert!(secondary.is_none());
        assert_eq!(primary.row_ids().get("u1"), Some(0));
        assert_eq!(primary.row_ids().get("u2"), Some(1));
        assert_eq!(primary.column_ids().get("i1"), Some(0));
        assert_eq!(primary.column_ids().get("i2"), Some(1));

        let outcome = job.run().unwrap();

        let calls = job.kernel.calls.borrow();
        assert_eq!(calls.len(), 1);

        let mut expected = SparseMatrix::new(2, 2);
        expected.add(0, 0, 1.0);
        expected.add(0, 1, 1.0);
        expected.add(1, 0, 1.0);

        assert_eq!(calls[0].0, expected);
        assert!(calls[0].1.is_empty());

        assert_eq!(outcome, RunOutcome::Completed { written: vec![output.join(io::SIMILARITY_MATRIX)] });
        assert!(output.join(io::SIMILARITY_MATRIX).is_dir());
        assert!(!output.join(io::CROSS_SIMILARITY_MATRIX).exists());
    }

    #[test]
    fn filtered_cross_dataset_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(
            dir.path(),
            "input.tsv",
            "u1\tiphone\tpurchase\n\
             u1\tipad\tview\n\
             u2\tipad\tpurchase\n\
             u3\tiphone\tview\n\
             u2\tgalaxy\tview\n",
        );
        let output = dir.path().join("out");

        let config = Config {
            input: vec![input],
            output: output.clone(),
            schema: InputSchema { filter_position: Some(2), ..InputSchema::default() },
            filter: Some(TagFilter {
                primary: "purchase".to_owned(),
                secondary: Some("view".to_owned()),
            }),
            write_input_matrices: true,
            num_threads: 1,
            ..Config::default()
        };

        let job = SimilarityJob::new(&config, RecordingKernel::default());

        let (purchases, views) = job.read_datasets().unwrap().unwrap();
        let views = views.unwrap();

        assert_eq!(purchases.num_rows(), 3);
        assert_eq!(views.num_rows(), 3);
        assert_eq!(purchases.row_ids(), views.row_ids());
        for user in ["u1", "u2", "u3"].iter() {
            assert_eq!(purchases.row_ids().get(user), views.row_ids().get(user));
        }

        // u3 never purchased anything, its row only exists through alignment
        let u3 = purchases.row_ids().get("u3").unwrap();
        assert!(purchases.matrix().row(u3).is_empty());

        let outcome = job.run().unwrap();

        let calls = job.kernel.calls.borrow();
        assert_eq!(calls[0].1.len(), 1);
        assert_eq!(calls[0].0.num_rows(), calls[0].1[0].num_rows());

        assert_eq!(outcome, RunOutcome::Completed {
            written: vec![
                output.join(io::SIMILARITY_MATRIX),
                output.join(io::CROSS_SIMILARITY_MATRIX),
                output.join(io::PRIMARY_INTERACTIONS),
                output.join(io::SECONDARY_INTERACTIONS),
            ],
        });

        let primary_interactions =
            fs::read_to_string(output.join(io::PRIMARY_INTERACTIONS).join("part-00000")).unwrap();
        assert_eq!(primary_interactions, "u1\tiphone:1\nu2\tipad:1\n");
    }

    #[test]
    fn second_input_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let purchases = input_file(dir.path(), "purchases.tsv", "u1\tiphone\nu2\tiphone\n");
        let views = input_file(dir.path(), "views.tsv", "u2\tipad\nu1\tipad\nu3\tgalaxy\n");
        let output = dir.path().join("out");

        let config = Config {
            input: vec![purchases],
            secondary_input: Some(vec![views]),
            output: output.clone(),
            max_prefs: 10,
            num_threads: 2,
            ..Config::default()
        };

        let outcome = SimilarityJob::new(&config, CooccurrenceKernel::new(2)).run().unwrap();

        match outcome {
            RunOutcome::Completed { written } => assert_eq!(written.len(), 2),
            other => panic!("unexpected outcome {:?}", other),
        }

        let cross =
            fs::read_to_string(output.join(io::CROSS_SIMILARITY_MATRIX).join("part-00000")).unwrap();

        // Both purchasers of the iphone viewed the ipad
        assert!(cross.starts_with("iphone\tipad:"));
        assert!(!cross.contains("galaxy"));
    }

    #[test]
    fn zero_scores_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        // a and b co-occur once, exactly as often as expected for independent items
        let input = input_file(dir.path(), "input.tsv", "u1\ta\nu1\tb\nu2\ta\nu3\tb\nu4\tc\n");
        let output = dir.path().join("out");

        let config = Config { input: vec![input], output: output.clone(), ..Config::default() };

        SimilarityJob::new(&config, CooccurrenceKernel::new(2)).run().unwrap();

        let similarities =
            fs::read_to_string(output.join(io::SIMILARITY_MATRIX).join("part-00000")).unwrap();
        assert_eq!(similarities, "");
    }

    #[test]
    fn zero_strengths_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "input.tsv", "u1\ta\t1\nu1\tb\t1\nu2\ta\t0\n");
        let output = dir.path().join("out");

        let config = Config {
            input: vec![input],
            output: output.clone(),
            schema: InputSchema { strength_position: Some(2), ..InputSchema::default() },
            write_input_matrices: true,
            ..Config::default()
        };

        let job = SimilarityJob::new(&config, RecordingKernel::default());

        let (primary, _) = job.read_datasets().unwrap().unwrap();
        assert_eq!(primary.num_rows(), 2);
        assert_eq!(primary.matrix().num_non_zeros(), 2);

        job.run().unwrap();

        let primary_interactions =
            fs::read_to_string(output.join(io::PRIMARY_INTERACTIONS).join("part-00000")).unwrap();
        assert_eq!(primary_interactions, "u1\ta:1 b:1\n");
    }

    #[test]
    fn results_replace_earlier_runs_and_leave_no_staging_behind() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "input.tsv", "u1\ti1\n");
        let output = dir.path().join("out");

        let stale = output.join(io::SIMILARITY_MATRIX).join("part-00001");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "stale\n").unwrap();

        let config = Config { input: vec![input], output: output.clone(), ..Config::default() };

        SimilarityJob::new(&config, RecordingKernel::default()).run().unwrap();

        assert!(output.join(io::SIMILARITY_MATRIX).join("part-00000").is_file());
        assert!(!stale.exists());
        assert!(!output.join(io::STAGING_DIRECTORY).exists());
    }

    #[test]
    fn failed_writes_publish_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "input.tsv", "u1\ti1\nu1\ti2\n");
        let output = dir.path().join("out");

        // A plain file where the staging directory belongs makes every write fail
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join(io::STAGING_DIRECTORY), "").unwrap();

        let config = Config {
            input: vec![input],
            output: output.clone(),
            write_input_matrices: true,
            ..Config::default()
        };

        match SimilarityJob::new(&config, RecordingKernel::default()).run() {
            Err(Error::Write { .. }) => {}
            other => panic!("unexpected result {:?}", other),
        }

        assert!(!output.join(io::SIMILARITY_MATRIX).exists());
        assert!(!output.join(io::PRIMARY_INTERACTIONS).exists());
    }

    #[test]
    fn empty_primary_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "input.tsv", "");
        let output = dir.path().join("out");

        let config = Config { input: vec![input], output: output.clone(), ..Config::default() };

        let job = SimilarityJob::new(&config, RecordingKernel::default());

        assert_eq!(job.run().unwrap(), RunOutcome::NoInput);
        assert!(job.kernel.calls.borrow().is_empty());
        assert!(!output.exists());
    }

    #[test]
    fn missing_primary_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");

        let config = Config {
            input: vec![dir.path().join("does-not-exist")],
            output: output.clone(),
            ..Config::default()
        };

        let outcome = SimilarityJob::new(&config, RecordingKernel::default()).run().unwrap();

        assert_eq!(outcome, RunOutcome::NoInput);
        assert!(!output.exists());
    }

    #[test]
    fn invalid_configuration_fails_before_reading() {
        let config = Config {
            input: vec![PathBuf::from("/definitely/not/there")],
            max_prefs: 0,
            ..Config::default()
        };

        let job = SimilarityJob::new(&config, RecordingKernel::default());

        match job.run() {
            Err(Error::Config(ConfigError::NonPositiveMaxPrefs)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        assert!(job.kernel.calls.borrow().is_empty());
    }

    #[test]
    fn kernel_failures_surface_unmodified_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path(), "input.tsv", "u1\ti1\n");
        let output = dir.path().join("out");

        let config = Config {
            input: vec![input],
            output: output.clone(),
            write_input_matrices: true,
            ..Config::default()
        };

        match SimilarityJob::new(&config, FailingKernel).run() {
            Err(Error::Kernel(KernelError::UnsupportedSecondaryCount(7))) => {}
            other => panic!("unexpected result {:?}", other),
        }

        assert!(!output.exists());
    }
}
