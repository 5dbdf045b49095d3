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

//! Reconciles the row identifier spaces of a primary and a secondary dataset.
//!
//! The similarity kernel assumes that row `i` of both matrices denotes the same entity (e.g.
//! the same user). Two independent reads would assign user indices independently and could
//! produce matrices with a different number of rows. We therefore read the secondary dataset
//! with the row index of the primary dataset as seed: users known from the primary dataset keep
//! their index, users only seen in the secondary dataset are appended. The primary dataset is
//! then padded with empty rows for those appended users.

use log::{debug, info};

use crate::dataset::IndexedDataset;
use crate::error::{Error, Result};

/// Two datasets sharing a single row identifier space.
#[derive(Debug)]
pub struct AlignedDatasets {
    pub primary: IndexedDataset,
    pub secondary: IndexedDataset,
}

/// Aligns `secondary`, which must have been read with the row index of `primary` as seed, to
/// `primary`. Afterwards both datasets have the same number of rows and the same row index.
pub fn align(primary: IndexedDataset, secondary: IndexedDataset) -> Result<AlignedDatasets> {

    if !primary.row_ids().is_extended_by(secondary.row_ids()) {
        return Err(Error::Misaligned(format!(
            "the row index of the secondary dataset ({} rows) does not extend the row index of \
            the primary dataset ({} rows)",
            secondary.num_rows(),
            primary.num_rows(),
        )));
    }

    let final_row_cardinality = secondary.row_ids().size();

    debug!(
        "Aligning datasets with {} and {} rows to {} rows",
        primary.num_rows(),
        secondary.num_rows(),
        final_row_cardinality,
    );

    let primary = if primary.num_rows() < final_row_cardinality {
        info!(
            "Padding primary dataset with {} rows only seen in the secondary dataset",
            final_row_cardinality - primary.num_rows(),
        );
        primary.with_row_cardinality(secondary.row_ids())?
    } else {
        primary
    };

    let secondary = if secondary.num_rows() < final_row_cardinality {
        secondary.with_row_cardinality(primary.row_ids())?
    } else {
        secondary
    };

    check_alignment(&primary, &secondary, final_row_cardinality)?;

    Ok(AlignedDatasets { primary, secondary })
}

fn check_alignment(
    primary: &IndexedDataset,
    secondary: &IndexedDataset,
    expected_rows: usize,
) -> Result<()> {

    if primary.num_rows() != expected_rows || secondary.num_rows() != expected_rows {
        return Err(Error::Misaligned(format!(
            "expected {} rows in both datasets, found {} and {}",
            expected_rows,
            primary.num_rows(),
            secondary.num_rows(),
        )));
    }

    if primary.row_ids() != secondary.row_ids() {
        return Err(Error::Misaligned("datasets ended up with different row indices".to_owned()));
    }

    Ok(())
}


#[cfg(test)]
mod tests {

    use std::path::Path;

    use super::align;
    use crate::config::InputSchema;
    use crate::dataset::IndexedDataset;
    use crate::error::Error;
    use crate::index::{IdentifierIndex, SharedIdentifierIndex};
    use crate::reader::TupleReader;

    fn dataset_from(
        input: &str,
        schema: &InputSchema,
        tag: Option<&str>,
        existing_row_ids: Option<&IdentifierIndex>,
    ) -> IndexedDataset {

        let reader = TupleReader::new(schema, tag);

        let rows = SharedIdentifierIndex::new(
            existing_row_ids.map(IdentifierIndex::seeded_from).unwrap_or_default());
        let columns = SharedIdentifierIndex::default();

        let (interactions, _) =
            reader.read_from(input.as_bytes(), Path::new("test"), &rows, &columns).unwrap();

        IndexedDataset::from_interactions(&interactions, rows.into_inner(), columns.into_inner())
            .unwrap()
    }

    #[test]
    fn aligned_datasets_share_rows() {
        let schema = InputSchema::default();

        let primary = dataset_from("u1\ti1\nu2\ti2\n", &schema, None, None);
        let secondary = dataset_from("u2\tv1\nu3\tv2\n", &schema, None, Some(primary.row_ids()));

        let u2_in_primary = primary.row_ids().get("u2").unwrap();

        let aligned = align(primary, secondary).unwrap();

        assert_eq!(aligned.primary.num_rows(), 3);
        assert_eq!(aligned.secondary.num_rows(), 3);

        assert_eq!(aligned.primary.row_ids().get("u2"), Some(u2_in_primary));
        assert_eq!(aligned.secondary.row_ids().get("u2"), Some(u2_in_primary));
        assert_eq!(aligned.primary.row_ids(), aligned.secondary.row_ids());

        // u3 only interacted in the secondary dataset, its primary row is empty
        let u3 = aligned.primary.row_ids().get("u3").unwrap();
        assert!(aligned.primary.matrix().row(u3).is_empty());
        assert_eq!(aligned.secondary.matrix().row(u3).len(), 1);

        // Columns are untouched
        assert_eq!(aligned.primary.num_columns(), 2);
        assert_eq!(aligned.secondary.column_ids().get("v2"), Some(1));
    }

    #[test]
    fn empty_secondary_dataset_is_aligned() {
        let schema = InputSchema::default();

        let primary = dataset_from("u1\ti1\nu2\ti2\n", &schema, None, None);
        let secondary = dataset_from("", &schema, None, Some(primary.row_ids()));

        assert_eq!(secondary.num_rows(), 2);
        assert_eq!(secondary.num_columns(), 0);

        let aligned = align(primary, secondary).unwrap();

        assert_eq!(aligned.primary.num_rows(), 2);
        assert_eq!(aligned.secondary.num_rows(), 2);
    }

    #[test]
    fn unseeded_secondary_dataset_is_rejected() {
        let schema = InputSchema::default();

        let primary = dataset_from("u1\ti1\nu2\ti2\n", &schema, None, None);
        let secondary = dataset_from("u2\tv1\nu3\tv2\n", &schema, None, None);

        assert!(matches!(align(primary, secondary), Err(Error::Misaligned(_))));
    }

    #[test]
    fn filtered_reads_of_one_input_are_aligned() {
        let schema = InputSchema { filter_position: Some(2), ..InputSchema::default() };

        let input = "alice\tiphone\tpurchase\n\
                     bob\tipad\tview\n\
                     alice\tipad\tview\n\
                     carol\tiphone\tview\n\
                     dave\tgalaxy\tpurchase\n\
                     bob\tgalaxy\tpurchase\n";

        let purchases = dataset_from(input, &schema, Some("purchase"), None);
        let views = dataset_from(input, &schema, Some("view"), Some(purchases.row_ids()));

        assert_eq!(purchases.num_rows(), 3);
        assert_eq!(views.num_rows(), 4);

        let purchase_row_ids = purchases.row_ids().clone();

        let aligned = align(purchases, views).unwrap();

        assert_eq!(aligned.primary.num_rows(), 4);
        assert_eq!(aligned.secondary.num_rows(), 4);

        for (index, user) in purchase_row_ids.iter() {
            assert_eq!(aligned.primary.row_ids().get(user), Some(index));
            assert_eq!(aligned.secondary.row_ids().get(user), Some(index));
        }

        let carol = aligned.secondary.row_ids().get("carol").unwrap();
        assert_eq!(carol, 3);
        assert_eq!(aligned.primary.row_ids().identifier_at(carol).unwrap(), "carol");
    }
}
