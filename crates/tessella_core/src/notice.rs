//! Change notices for accessor rebasing.
//!
//! Every mutation that moves or destroys rows, columns or tables pushes a
//! [`ChangeNotice`] onto the group's notice buffer — including motion
//! caused by cascade deletion, which is not visible in any instruction
//! stream. Hosts drain the buffer after each operation and use the notices
//! to rebase or detach accessor handles.

/// A single structural change to the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeNotice {
    /// A table was appended at `table`.
    TableInserted {
        /// Index of the new table.
        table: usize,
    },
    /// The table at `table` was erased; later tables shifted down.
    TableErased {
        /// Index the table had before erasure.
        table: usize,
    },
    /// A table moved from `from` to `to`; tables in between shifted.
    TableMoved {
        /// Previous index.
        from: usize,
        /// New index.
        to: usize,
    },
    /// A column was inserted at (`table`, `col`); later columns shifted up.
    ColumnInserted {
        /// Owning table.
        table: usize,
        /// Index of the new column.
        col: usize,
    },
    /// The column at (`table`, `col`) was erased; later columns shifted down.
    ColumnErased {
        /// Owning table.
        table: usize,
        /// Index the column had before erasure.
        col: usize,
    },
    /// A column moved from `from` to `to` within `table`.
    ColumnMoved {
        /// Owning table.
        table: usize,
        /// Previous index.
        from: usize,
        /// New index.
        to: usize,
    },
    /// `count` rows were inserted at `row`; later rows shifted up.
    RowsInserted {
        /// Owning table.
        table: usize,
        /// First new row index.
        row: usize,
        /// Number of rows inserted.
        count: usize,
    },
    /// The row at `row` was removed; if `moved_last` is set, that row was
    /// swapped into the freed slot.
    RowRemoved {
        /// Owning table.
        table: usize,
        /// Index of the removed row.
        row: usize,
        /// Previous index of the row that took its place, if any.
        moved_last: Option<usize>,
    },
    /// Every row of `table` was removed.
    TableCleared {
        /// The cleared table.
        table: usize,
    },
}
