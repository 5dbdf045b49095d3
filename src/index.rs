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

use std::convert::TryFrom;
use std::sync::Mutex;

use fnv::FnvHashMap;

use crate::error::{Error, Result};

/// Bidirectional mapping between string identifiers and consecutive integer indices. Indices are
/// handed out in the order in which identifiers are first seen and never change afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdentifierIndex {
    indices: FnvHashMap<String, u32>,
    identifiers: Vec<String>,
}

impl IdentifierIndex {

    pub fn new() -> Self {
        IdentifierIndex::default()
    }

    /// Creates an index which starts out with all assignments of `existing`, so that identifiers
    /// known to `existing` keep their index and unseen ones are appended after them.
    pub fn seeded_from(existing: &IdentifierIndex) -> Self {
        existing.clone()
    }

    /// Returns the index of `identifier`, allocating the next free index if it is unknown.
    /// Fails once all `u32` indices are taken.
    pub fn index_of(&mut self, identifier: &str) -> Result<u32> {
        if let Some(index) = self.indices.get(identifier) {
            return Ok(*index);
        }

        let index = next_index(self.identifiers.len())?;
        self.indices.insert(identifier.to_owned(), index);
        self.identifiers.push(identifier.to_owned());

        Ok(index)
    }

    pub fn get(&self, identifier: &str) -> Option<u32> {
        self.indices.get(identifier).cloned()
    }

    pub fn identifier_at(&self, index: u32) -> Result<&str> {
        self.identifiers.get(index as usize)
            .map(|identifier| identifier.as_str())
            .ok_or(Error::IndexOutOfRange { index: index as usize, size: self.size() })
    }

    pub fn size(&self) -> usize {
        self.identifiers.len()
    }

    /// Identifiers in index order.
    pub fn iter(&self) -> impl Iterator<Item=(u32, &str)> {
        self.identifiers.iter()
            .enumerate()
            .map(|(index, identifier)| (index as u32, identifier.as_str()))
    }

    /// Whether `other` assigns every identifier of this index to the very same index, i.e. it
    /// is this index with zero or more identifiers appended.
    pub fn is_extended_by(&self, other: &IdentifierIndex) -> bool {
        other.size() >= self.size() &&
            self.identifiers.iter().zip(other.identifiers.iter()).all(|(ours, theirs)| ours == theirs)
    }
}

fn next_index(size: usize) -> Result<u32> {
    u32::try_from(size).map_err(|_| Error::IdentifierSpaceExhausted { size })
}

/// Identifier index which can be grown from several parsing tasks at once. Lookup and
/// allocation happen in a single critical section, so concurrent first sightings of the same
/// identifier end up with the same index.
#[derive(Debug, Default)]
pub struct SharedIdentifierIndex {
    inner: Mutex<IdentifierIndex>,
}

impl SharedIdentifierIndex {

    pub fn new(index: IdentifierIndex) -> Self {
        SharedIdentifierIndex { inner: Mutex::new(index) }
    }

    pub fn index_of(&self, identifier: &str) -> Result<u32> {
        // A poisoned lock only means another parsing task panicked, the index itself is
        // append-only and never left half-updated.
        let mut index = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        index.index_of(identifier)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).size()
    }

    /// Hands back the finished index once all parsing tasks are done.
    pub fn into_inner(self) -> IdentifierIndex {
        self.inner.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}


#[cfg(test)]
mod tests {

    use std::sync::Arc;
    use std::thread;

    use super::{next_index, IdentifierIndex, SharedIdentifierIndex};
    use crate::error::Error;

    #[test]
    fn indices_follow_first_appearance() {
        let mut index = IdentifierIndex::new();

        let identifiers = ["c", "a", "c", "b", "a", "d"];
        let assigned: Vec<u32> = identifiers.iter()
            .map(|id| index.index_of(id).unwrap())
            .collect();

        assert_eq!(assigned, vec![0, 1, 0, 2, 1, 3]);
        assert_eq!(index.size(), 4);

        for identifier in identifiers.iter() {
            let position = index.get(identifier).unwrap();
            assert_eq!(index.identifier_at(position).unwrap(), *identifier);
        }

        let in_order: Vec<&str> = index.iter().map(|(_, identifier)| identifier).collect();
        assert_eq!(in_order, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn identifiers_are_kept_verbatim() {
        let mut index = IdentifierIndex::new();
        let odd = " user 42\u{e9} ";

        let position = index.index_of(odd).unwrap();
        assert_eq!(index.identifier_at(position).unwrap(), odd);
    }

    #[test]
    fn out_of_range_lookup_fails() {
        let mut index = IdentifierIndex::new();
        index.index_of("a").unwrap();

        match index.identifier_at(1) {
            Err(Error::IndexOutOfRange { index: 1, size: 1 }) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn index_space_is_bounded() {
        assert_eq!(next_index(u32::MAX as usize).unwrap(), u32::MAX);

        match next_index(u32::MAX as usize + 1) {
            Err(Error::IdentifierSpaceExhausted { size }) => assert_eq!(size, u32::MAX as usize + 1),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn seeding_preserves_indices() {
        let mut first = IdentifierIndex::new();
        for identifier in ["a", "b", "c"].iter() {
            first.index_of(identifier).unwrap();
        }

        let mut second = IdentifierIndex::seeded_from(&first);

        assert_eq!(second.index_of("b").unwrap(), first.get("b").unwrap());

        let new_index = second.index_of("d").unwrap();
        assert!(new_index as usize >= first.size());
        assert_eq!(new_index, 3);

        assert!(first.is_extended_by(&second));
        assert!(!second.is_extended_by(&first));
        assert_eq!(first.size(), 3);
    }

    #[test]
    fn differently_ordered_index_is_no_extension() {
        let mut first = IdentifierIndex::new();
        first.index_of("a").unwrap();
        first.index_of("b").unwrap();

        let mut second = IdentifierIndex::new();
        second.index_of("b").unwrap();
        second.index_of("a").unwrap();
        second.index_of("c").unwrap();

        assert!(!first.is_extended_by(&second));
    }

    #[test]
    fn concurrent_first_sightings_share_an_index() {
        let shared = Arc::new(SharedIdentifierIndex::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    (0..100)
                        .map(|n| shared.index_of(&format!("user-{}", n)).unwrap())
                        .collect::<Vec<u32>>()
                })
            })
            .collect();

        let results: Vec<Vec<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for result in results.iter() {
            assert_eq!(result, &results[0]);
        }

        let index = Arc::try_unwrap(shared).unwrap().into_inner();
        assert_eq!(index.size(), 100);

        for (position, identifier) in index.iter() {
            assert_eq!(index.get(identifier), Some(position));
        }
    }
}
