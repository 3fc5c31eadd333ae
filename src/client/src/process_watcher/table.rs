use itertools::Itertools;
use perfcap_common::types::process::ProcessInfo;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// One incremental change produced by a merge. Deltas are emitted in the
/// order removals → updates → inserts; each row index is valid in the table
/// state at the moment the delta is emitted, so a view can replay them
/// one by one instead of resetting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableDelta {
    Removed { row: usize, pid: u32 },
    Updated { row: usize, pid: u32 },
    Inserted { row: usize, pid: u32 },
}

/// The canonical mutable list of known processes, keyed by pid, plus the
/// attach-mode selection. Row order is presentational: merges never disturb
/// the relative order of surviving rows, so scroll position and
/// multi-selection stay valid across refreshes.
#[derive(Debug, Default)]
pub struct ProcessTable {
    rows: Vec<ProcessInfo>,
    selection: HashSet<u32>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ProcessInfo] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get_by_pid(&self, pid: u32) -> Option<&ProcessInfo> {
        self.rows.iter().find(|row| row.pid == pid)
    }

    /// Marks a known process as selected. Returns false for unknown pids.
    pub fn select(&mut self, pid: u32) -> bool {
        if self.get_by_pid(pid).is_some() {
            self.selection.insert(pid);
            true
        } else {
            false
        }
    }

    pub fn deselect(&mut self, pid: u32) -> bool {
        self.selection.remove(&pid)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, pid: u32) -> bool {
        self.selection.contains(&pid)
    }

    /// Selected pids in ascending order.
    pub fn selected_pids(&self) -> Vec<u32> {
        self.selection.iter().copied().sorted_unstable().collect()
    }

    /// Rows ordered by case-insensitive name, for display.
    pub fn sorted_by_name(&self) -> Vec<&ProcessInfo> {
        self.rows
            .iter()
            .sorted_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .collect()
    }

    /// Reconciles the table with a fresh snapshot: rows absent from the
    /// snapshot are removed (their selection entries dropped), surviving rows
    /// are updated in place, new pids are appended in snapshot order.
    /// Idempotent: merging the same snapshot twice changes nothing the
    /// second time.
    pub fn merge(&mut self, snapshot: Vec<ProcessInfo>) -> Vec<TableDelta> {
        let mut deltas = Vec::new();

        let order: Vec<u32> = snapshot.iter().map(|record| record.pid).collect();
        let mut incoming: HashMap<u32, ProcessInfo> = snapshot
            .into_iter()
            .map(|record| (record.pid, record))
            .collect();

        // exited processes
        let mut row = 0;
        while row < self.rows.len() {
            if incoming.contains_key(&self.rows[row].pid) {
                row += 1;
            } else {
                let removed = self.rows.remove(row);
                self.selection.remove(&removed.pid);
                deltas.push(TableDelta::Removed {
                    row,
                    pid: removed.pid,
                });
            }
        }

        // surviving processes, updated in place to preserve identity
        for (row, current) in self.rows.iter_mut().enumerate() {
            if let Some(fresh) = incoming.remove(&current.pid) {
                if fresh.name != current.name || fresh.state != current.state {
                    current.name = fresh.name;
                    current.state = fresh.state;
                    deltas.push(TableDelta::Updated {
                        row,
                        pid: current.pid,
                    });
                }
            }
        }

        // new processes, appended in snapshot order
        for pid in order {
            if let Some(fresh) = incoming.remove(&pid) {
                self.rows.push(fresh);
                deltas.push(TableDelta::Inserted {
                    row: self.rows.len() - 1,
                    pid,
                });
            }
        }

        trace!("merge produced {} deltas", deltas.len());
        deltas
    }
}
