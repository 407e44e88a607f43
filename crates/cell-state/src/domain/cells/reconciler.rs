//! Parent and child cell maps, reconciled against full directory snapshots.

use std::collections::HashMap;

use api_types::CellRecord;

use super::cell_state::CellState;
use super::traits::CellStateFactory;

/// Outcome of one reconciliation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Known parent and child cells keyed by name
///
/// A name is tracked in at most one of the two maps, and the `is_parent` flag
/// of its directory info matches the map it lives in.
#[derive(Debug, Default, Clone)]
pub struct CellMaps {
    parents: HashMap<String, CellState>,
    children: HashMap<String, CellState>,
}

impl CellMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parents(&self) -> &HashMap<String, CellState> {
        &self.parents
    }

    pub fn children(&self) -> &HashMap<String, CellState> {
        &self.children
    }

    /// Look up a cell by name, children first
    pub fn find_mut(&mut self, cell_name: &str) -> Option<&mut CellState> {
        match self.children.get_mut(cell_name) {
            Some(cell) => Some(cell),
            None => self.parents.get_mut(cell_name),
        }
    }

    /// Make the maps match a full directory snapshot.
    ///
    /// Cells still listed under the same classification keep their
    /// capabilities, capacities and last-seen time and only get fresh
    /// directory info. Cells missing from the snapshot, or whose parent/child
    /// flag flipped, are dropped; snapshot records not yet tracked get a new
    /// cell state from `factory`.
    pub fn reconcile(
        &mut self,
        records: Vec<CellRecord>,
        factory: &dyn CellStateFactory,
    ) -> ReconcileSummary {
        let snapshot: HashMap<String, CellRecord> = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        let mut summary = ReconcileSummary::default();

        for (cells, is_parent) in [(&mut self.parents, true), (&mut self.children, false)] {
            cells.retain(|cell_name, cell| match snapshot.get(cell_name) {
                Some(record) if record.is_parent == is_parent => {
                    cell.update_directory_info(record);
                    summary.updated += 1;
                    true
                }
                _ => {
                    summary.removed += 1;
                    false
                }
            });
        }

        for (cell_name, record) in &snapshot {
            let cells = if record.is_parent {
                &mut self.parents
            } else {
                &mut self.children
            };
            if cells.contains_key(cell_name) {
                continue;
            }
            let mut cell = factory.create(cell_name, false);
            cell.update_directory_info(record);
            cells.insert(cell_name.clone(), cell);
            summary.added += 1;
        }

        summary
    }
}
