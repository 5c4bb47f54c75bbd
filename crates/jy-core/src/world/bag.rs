//! The party's shared inventory

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Item id to count. Entries at zero are removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bag {
    items: BTreeMap<i16, i16>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` of `item_id`. A negative count removes.
    pub fn add(&mut self, item_id: i16, count: i16) {
        if item_id < 0 || count == 0 {
            return;
        }
        let entry = self.items.entry(item_id).or_insert(0);
        *entry = entry.saturating_add(count);
        if *entry <= 0 {
            self.items.remove(&item_id);
        }
    }

    /// Remove up to `count` of `item_id`. Returns false if none were held.
    pub fn remove(&mut self, item_id: i16, count: i16) -> bool {
        if self.count(item_id) <= 0 {
            return false;
        }
        self.add(item_id, -count.max(0));
        true
    }

    pub fn count(&self, item_id: i16) -> i16 {
        self.items.get(&item_id).copied().unwrap_or(0)
    }

    /// Held items in ascending id order.
    pub fn items(&self) -> impl Iterator<Item = (i16, i16)> + '_ {
        self.items.iter().map(|(&id, &count)| (id, count))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<(i16, i16)> for Bag {
    fn from_iter<I: IntoIterator<Item = (i16, i16)>>(iter: I) -> Self {
        let mut bag = Bag::new();
        for (id, count) in iter {
            bag.add(id, count);
        }
        bag
    }
}
