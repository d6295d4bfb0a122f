//! Enumeration of the entries currently known to a store.

use std::vec;

use crate::store::{Entry, StateStore};

/// Walks every owner of a store and every value under it.
///
/// Owners are listed when the enumeration is created; the values of an
/// owner are listed when the walk reaches it. The walk is consumed by value
/// and cannot be restarted.
pub struct Discovery<'a, S> {
    store: &'a S,
    owners: vec::IntoIter<String>,
    current: Option<(String, vec::IntoIter<String>)>,
}

impl<S> std::fmt::Debug for Discovery<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("remaining_owners", &self.owners.len())
            .field("current", &self.current.as_ref().map(|(owner, _)| owner))
            .finish_non_exhaustive()
    }
}

/// Start enumerating the entries of `store`.
///
/// Only meaningful after the store reported its initial population.
pub fn discover<S: StateStore>(store: &S) -> Discovery<'_, S> {
    Discovery {
        store,
        owners: store.owners().into_iter(),
        current: None,
    }
}

impl<S: StateStore> Iterator for Discovery<'_, S> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        loop {
            if let Some((owner, values)) = &mut self.current {
                if let Some(value) = values.next() {
                    return Some(Entry::new(owner.clone(), value));
                }
            }

            let owner = self.owners.next()?;
            let values = self.store.values(&owner).into_iter();
            self.current = Some((owner, values));
        }
    }
}
