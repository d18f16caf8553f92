//! Attachment discipline: observer-driven accessor rebasing.
//!
//! Accessor handles held by surrounding code must either stay valid
//! across an applied instruction (indices rebased) or be explicitly
//! detached. The applier forwards every [`ChangeNotice`] — including
//! motion caused by cascade deletions — to an [`ApplyObserver`] after
//! each instruction; [`AnchorSet`] is a ready-made observer implementing
//! the rebase rules for row and link-list anchors.

use tessella_core::ChangeNotice;

/// Receives change notices during apply.
pub trait ApplyObserver {
    /// Called once per structural change, in order.
    fn on_change(&mut self, notice: &ChangeNotice);
}

/// A row accessor anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowAnchor {
    /// Group-level table index.
    pub table: usize,
    /// Row index, kept current while attached.
    pub row: usize,
    /// False once the anchored row is gone.
    pub attached: bool,
}

/// A link-list accessor anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListAnchor {
    /// Group-level table index of the origin table.
    pub table: usize,
    /// Link list column index, kept current while attached.
    pub col: usize,
    /// Origin row index, kept current while attached.
    pub row: usize,
    /// False once the anchored list is gone.
    pub attached: bool,
}

/// Identifier of an anchor within an [`AnchorSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorId(usize);

/// A set of anchors rebased by change notices.
#[derive(Debug, Default)]
pub struct AnchorSet {
    rows: Vec<RowAnchor>,
    lists: Vec<ListAnchor>,
}

impl AnchorSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchors a row accessor.
    pub fn anchor_row(&mut self, table: usize, row: usize) -> AnchorId {
        self.rows.push(RowAnchor {
            table,
            row,
            attached: true,
        });
        AnchorId(self.rows.len() - 1)
    }

    /// Anchors a link-list accessor.
    pub fn anchor_list(&mut self, table: usize, col: usize, row: usize) -> AnchorId {
        self.lists.push(ListAnchor {
            table,
            col,
            row,
            attached: true,
        });
        AnchorId(self.lists.len() - 1)
    }

    /// Reads a row anchor.
    pub fn row(&self, id: AnchorId) -> &RowAnchor {
        &self.rows[id.0]
    }

    /// Reads a list anchor.
    pub fn list(&self, id: AnchorId) -> &ListAnchor {
        &self.lists[id.0]
    }
}

impl ApplyObserver for AnchorSet {
    fn on_change(&mut self, notice: &ChangeNotice) {
        match *notice {
            ChangeNotice::TableInserted { .. } => {}
            ChangeNotice::TableErased { table } => {
                for a in self.rows.iter_mut() {
                    if !a.attached {
                        continue;
                    }
                    if a.table == table {
                        a.attached = false;
                    } else if a.table > table {
                        a.table -= 1;
                    }
                }
                for a in self.lists.iter_mut() {
                    if !a.attached {
                        continue;
                    }
                    if a.table == table {
                        a.attached = false;
                    } else if a.table > table {
                        a.table -= 1;
                    }
                }
            }
            ChangeNotice::TableMoved { from, to } => {
                for table in self
                    .rows
                    .iter_mut()
                    .filter(|a| a.attached)
                    .map(|a| &mut a.table)
                    .chain(
                        self.lists
                            .iter_mut()
                            .filter(|a| a.attached)
                            .map(|a| &mut a.table),
                    )
                {
                    *table = remap_index(*table, from, to);
                }
            }
            ChangeNotice::ColumnInserted { table, col } => {
                for a in self.lists.iter_mut() {
                    if a.attached && a.table == table && a.col >= col {
                        a.col += 1;
                    }
                }
            }
            ChangeNotice::ColumnErased { table, col } => {
                for a in self.lists.iter_mut() {
                    if !a.attached || a.table != table {
                        continue;
                    }
                    if a.col == col {
                        a.attached = false;
                    } else if a.col > col {
                        a.col -= 1;
                    }
                }
            }
            ChangeNotice::ColumnMoved { table, from, to } => {
                for a in self.lists.iter_mut() {
                    if a.attached && a.table == table {
                        a.col = remap_index(a.col, from, to);
                    }
                }
            }
            ChangeNotice::RowsInserted { table, row, count } => {
                for a in self.rows.iter_mut() {
                    if a.attached && a.table == table && a.row >= row {
                        a.row += count;
                    }
                }
                for a in self.lists.iter_mut() {
                    if a.attached && a.table == table && a.row >= row {
                        a.row += count;
                    }
                }
            }
            ChangeNotice::RowRemoved {
                table,
                row,
                moved_last,
            } => {
                for a in self.rows.iter_mut() {
                    if !a.attached || a.table != table {
                        continue;
                    }
                    if a.row == row {
                        a.attached = false;
                    } else if Some(a.row) == moved_last {
                        a.row = row;
                    }
                }
                for a in self.lists.iter_mut() {
                    if !a.attached || a.table != table {
                        continue;
                    }
                    if a.row == row {
                        a.attached = false;
                    } else if Some(a.row) == moved_last {
                        a.row = row;
                    }
                }
            }
            ChangeNotice::TableCleared { table } => {
                for a in self.rows.iter_mut() {
                    if a.attached && a.table == table {
                        a.attached = false;
                    }
                }
                for a in self.lists.iter_mut() {
                    if a.attached && a.table == table {
                        a.attached = false;
                    }
                }
            }
        }
    }
}

fn remap_index(i: usize, from: usize, to: usize) -> usize {
    if i == from {
        to
    } else if from < to && i > from && i <= to {
        i - 1
    } else if to < from && i >= to && i < from {
        i + 1
    } else {
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_anchor_follows_moved_last_row() {
        let mut set = AnchorSet::new();
        let gone = set.anchor_row(0, 1);
        let moved = set.anchor_row(0, 3);
        set.on_change(&ChangeNotice::RowRemoved {
            table: 0,
            row: 1,
            moved_last: Some(3),
        });
        assert!(!set.row(gone).attached);
        assert!(set.row(moved).attached);
        assert_eq!(set.row(moved).row, 1);
    }

    #[test]
    fn insertion_shifts_anchors_up() {
        let mut set = AnchorSet::new();
        let below = set.anchor_row(0, 0);
        let above = set.anchor_row(0, 2);
        set.on_change(&ChangeNotice::RowsInserted {
            table: 0,
            row: 1,
            count: 2,
        });
        assert_eq!(set.row(below).row, 0);
        assert_eq!(set.row(above).row, 4);
    }

    #[test]
    fn clear_detaches_table_anchors_only() {
        let mut set = AnchorSet::new();
        let a = set.anchor_row(0, 0);
        let b = set.anchor_row(1, 0);
        set.on_change(&ChangeNotice::TableCleared { table: 0 });
        assert!(!set.row(a).attached);
        assert!(set.row(b).attached);
    }

    #[test]
    fn list_anchor_tracks_column_motion() {
        let mut set = AnchorSet::new();
        let id = set.anchor_list(0, 1, 0);
        set.on_change(&ChangeNotice::ColumnInserted { table: 0, col: 0 });
        assert_eq!(set.list(id).col, 2);
        set.on_change(&ChangeNotice::ColumnMoved {
            table: 0,
            from: 2,
            to: 0,
        });
        assert_eq!(set.list(id).col, 0);
        set.on_change(&ChangeNotice::ColumnErased { table: 0, col: 0 });
        assert!(!set.list(id).attached);
    }

    #[test]
    fn table_erasure_renumbers_later_anchors() {
        let mut set = AnchorSet::new();
        let on_erased = set.anchor_row(1, 0);
        let later = set.anchor_row(2, 5);
        set.on_change(&ChangeNotice::TableErased { table: 1 });
        assert!(!set.row(on_erased).attached);
        assert!(set.row(later).attached);
        assert_eq!(set.row(later).table, 1);
    }
}
