// Stereux Core - Sliding-window playlist engine for the Stereux player
// Copyright (C) 2025 Stereux contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Fixed-capacity buffer of catalog entries around a current position
//!
//! The current entry always sits at `middle = capacity / 2`. Navigation never
//! moves that index: the buffer drops one end and grows the other, so the
//! neighbor slides into the middle.

use crate::error::{PlayerError, Result};
use crate::storage::CatalogEntry;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct PlaylistWindow {
    entries: VecDeque<CatalogEntry>,
    capacity: usize,
}

impl PlaylistWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn middle(&self) -> usize {
        self.capacity / 2
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Entry at the middle index
    pub fn current(&self) -> Option<&CatalogEntry> {
        self.entries.get(self.middle())
    }

    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Ids in window order
    pub fn ids(&self) -> Vec<i64> {
        self.entries.iter().filter_map(|e| e.id).collect()
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.entries.iter().any(|e| e.id == Some(id))
    }

    /// Whether an entry with the same title and creators is already held
    pub fn contains_duplicate_of(&self, entry: &CatalogEntry) -> bool {
        self.entries.iter().any(|e| e.is_duplicate_of(entry))
    }

    pub fn find(&self, id: i64) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == Some(id))
    }

    /// Replace the entry with the same id, returning whether it was present
    pub fn replace(&mut self, entry: CatalogEntry) -> bool {
        let Some(id) = entry.id else {
            return false;
        };
        match self.entries.iter_mut().find(|e| e.id == Some(id)) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }

    pub fn push_back(&mut self, entry: CatalogEntry) -> Result<()> {
        self.check_insert(&entry)?;
        self.entries.push_back(entry);
        Ok(())
    }

    pub fn push_front(&mut self, entry: CatalogEntry) -> Result<()> {
        self.check_insert(&entry)?;
        self.entries.push_front(entry);
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<CatalogEntry> {
        self.entries.pop_front()
    }

    pub fn pop_back(&mut self) -> Option<CatalogEntry> {
        self.entries.pop_back()
    }

    fn check_insert(&self, entry: &CatalogEntry) -> Result<()> {
        if self.is_full() {
            return Err(PlayerError::invariant(format!(
                "window is full ({} entries)",
                self.capacity
            )));
        }
        if self.contains_duplicate_of(entry) {
            return Err(PlayerError::invariant(format!(
                "'{}' is already in the window",
                entry.display_name()
            )));
        }
        Ok(())
    }

    /// Indices from the middle outward: neighbors first, the middle itself last
    ///
    /// For capacity 5: `[3, 1, 4, 0, 2]`.
    pub fn center_out_order(&self) -> Vec<usize> {
        let middle = self.middle();
        let mut order = Vec::with_capacity(self.capacity);

        for distance in 1..=middle.max(self.capacity.saturating_sub(middle + 1)) {
            if middle + distance < self.capacity {
                order.push(middle + distance);
            }
            if distance <= middle {
                order.push(middle - distance);
            }
        }
        if self.capacity > 0 {
            order.push(middle);
        }
        order
    }
}
