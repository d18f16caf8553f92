//! Write transactions.
//!
//! A write transaction pairs exclusive access to the store's group with
//! the recorder bound to it. Every mutation records its instruction
//! first, then performs the in-memory mutation; if either step fails the
//! transaction is poisoned and only abort remains. Dropping an
//! uncommitted transaction (or calling [`WriteTransaction::abort`])
//! restores the snapshot taken at the start, so no partial changeset or
//! partial state is ever observable.

use crate::error::{ReplError, ReplResult};
use crate::recorder::Recorder;
use parking_lot::RwLockWriteGuard;
use std::sync::atomic::{AtomicU64, Ordering};
use tessella_codec::Changeset;
use tessella_core::{ChangeNotice, ColumnType, Group, LinkStrength, Mixed, Timestamp};

/// An exclusive write transaction over a store.
pub struct WriteTransaction<'a> {
    version: &'a AtomicU64,
    group: RwLockWriteGuard<'a, Group>,
    snapshot: Option<Group>,
    recorder: Recorder,
    poisoned: bool,
    committed: bool,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(version: &'a AtomicU64, group: RwLockWriteGuard<'a, Group>) -> Self {
        let snapshot = Some(group.clone());
        Self {
            version,
            group,
            snapshot,
            recorder: Recorder::new(),
            poisoned: false,
            committed: false,
        }
    }

    /// Read access to the group under mutation.
    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Drains the change notices produced so far.
    pub fn take_notices(&mut self) -> Vec<ChangeNotice> {
        self.group.take_notices()
    }

    /// Commits the transaction, freezing the recorded instructions into
    /// the changeset of the next version.
    pub fn commit(mut self) -> ReplResult<Changeset> {
        if self.poisoned {
            return Err(ReplError::TransactionPoisoned);
        }
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let recorder = std::mem::take(&mut self.recorder);
        let changeset = recorder.freeze(version);
        self.group.take_notices();
        self.committed = true;
        tracing::trace!(version, bytes = changeset.len(), "committed write transaction");
        Ok(changeset)
    }

    /// Aborts the transaction, discarding the buffer and restoring the
    /// pre-transaction state.
    pub fn abort(self) {
        // Drop restores the snapshot.
    }

    fn op<T>(&mut self, f: impl FnOnce(&mut Self) -> ReplResult<T>) -> ReplResult<T> {
        if self.poisoned {
            return Err(ReplError::TransactionPoisoned);
        }
        let result = f(self);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    // ---- group-level operations -----------------------------------------

    /// Appends a table. See [`Group::add_table`].
    pub fn add_table(&mut self, name: &str) -> ReplResult<usize> {
        self.op(|t| {
            t.recorder.add_table(name)?;
            Ok(t.group.add_table(name)?)
        })
    }

    /// Erases a table. See [`Group::erase_table`].
    pub fn erase_table(&mut self, table: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.erase_table(table)?;
            Ok(t.group.erase_table(table)?)
        })
    }

    /// Renames a table. See [`Group::rename_table`].
    pub fn rename_table(&mut self, table: usize, name: &str) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.rename_table(table, name)?;
            Ok(t.group.rename_table(table, name)?)
        })
    }

    /// Moves a table. See [`Group::move_table`].
    pub fn move_table(&mut self, from: usize, to: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.move_table(from, to)?;
            Ok(t.group.move_table(from, to)?)
        })
    }

    // ---- schema operations ----------------------------------------------

    /// Appends a scalar column. See [`Group::add_column`].
    pub fn add_column(
        &mut self,
        tbl: usize,
        ty: ColumnType,
        name: &str,
        nullable: bool,
    ) -> ReplResult<usize> {
        self.op(|t| {
            let col = t.group.table(tbl)?.column_count();
            t.recorder.insert_column(tbl, &[], col, ty, name, nullable, None)?;
            Ok(t.group.add_column(tbl, ty, name, nullable)?)
        })
    }

    /// Inserts a scalar column. See [`Group::insert_column`].
    pub fn insert_column(
        &mut self,
        tbl: usize,
        col: usize,
        ty: ColumnType,
        name: &str,
        nullable: bool,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.insert_column(tbl, &[], col, ty, name, nullable, None)?;
            Ok(t.group.insert_column(tbl, col, ty, name, nullable)?)
        })
    }

    /// Appends a link column. See [`Group::add_column_link`].
    pub fn add_column_link(
        &mut self,
        tbl: usize,
        ty: ColumnType,
        name: &str,
        target: usize,
        strength: LinkStrength,
    ) -> ReplResult<usize> {
        self.op(|t| {
            let col = t.group.table(tbl)?.column_count();
            t.recorder
                .insert_column(tbl, &[], col, ty, name, false, Some((target, strength)))?;
            Ok(t.group.add_column_link(tbl, ty, name, target, strength)?)
        })
    }

    /// Inserts a link column. See [`Group::insert_column_link`].
    pub fn insert_column_link(
        &mut self,
        tbl: usize,
        col: usize,
        ty: ColumnType,
        name: &str,
        target: usize,
        strength: LinkStrength,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder
                .insert_column(tbl, &[], col, ty, name, false, Some((target, strength)))?;
            Ok(t.group
                .insert_column_link(tbl, col, ty, name, target, strength)?)
        })
    }

    /// Inserts a scalar column into a nested descriptor. See
    /// [`Group::insert_column_at`].
    pub fn insert_column_at(
        &mut self,
        tbl: usize,
        path: &[usize],
        col: usize,
        ty: ColumnType,
        name: &str,
        nullable: bool,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.insert_column(tbl, path, col, ty, name, nullable, None)?;
            Ok(t.group
                .insert_column_at(tbl, path, col, ty, name, nullable, None)?)
        })
    }

    /// Erases a column. See [`Group::erase_column`].
    pub fn erase_column(&mut self, tbl: usize, col: usize) -> ReplResult<()> {
        self.erase_column_at(tbl, &[], col)
    }

    /// Erases a column of a nested descriptor.
    pub fn erase_column_at(&mut self, tbl: usize, path: &[usize], col: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.erase_column(tbl, path, col)?;
            Ok(t.group.erase_column_at(tbl, path, col)?)
        })
    }

    /// Renames a column. See [`Group::rename_column`].
    pub fn rename_column(&mut self, tbl: usize, col: usize, name: &str) -> ReplResult<()> {
        self.rename_column_at(tbl, &[], col, name)
    }

    /// Renames a column of a nested descriptor.
    pub fn rename_column_at(
        &mut self,
        tbl: usize,
        path: &[usize],
        col: usize,
        name: &str,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.rename_column(tbl, path, col, name)?;
            Ok(t.group.rename_column_at(tbl, path, col, name)?)
        })
    }

    /// Moves a column. See [`Group::move_column`].
    pub fn move_column(&mut self, tbl: usize, from: usize, to: usize) -> ReplResult<()> {
        self.move_column_at(tbl, &[], from, to)
    }

    /// Moves a column of a nested descriptor.
    pub fn move_column_at(
        &mut self,
        tbl: usize,
        path: &[usize],
        from: usize,
        to: usize,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.move_column(tbl, path, from, to)?;
            Ok(t.group.move_column_at(tbl, path, from, to)?)
        })
    }

    /// Adds a search index. See [`Group::add_search_index`].
    pub fn add_search_index(&mut self, tbl: usize, col: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.add_search_index(tbl, col)?;
            Ok(t.group.add_search_index(tbl, col)?)
        })
    }

    /// Removes a search index. See [`Group::remove_search_index`].
    pub fn remove_search_index(&mut self, tbl: usize, col: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.remove_search_index(tbl, col)?;
            Ok(t.group.remove_search_index(tbl, col)?)
        })
    }

    // ---- row operations -------------------------------------------------

    /// Appends empty rows. See [`Group::add_empty_row`].
    pub fn add_empty_row(&mut self, tbl: usize, count: usize) -> ReplResult<usize> {
        self.op(|t| {
            t.recorder.add_empty_row(tbl, count)?;
            Ok(t.group.add_empty_row(tbl, count)?)
        })
    }

    /// Inserts empty rows. See [`Group::insert_empty_row`].
    pub fn insert_empty_row(&mut self, tbl: usize, at: usize, count: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.insert_empty_row(tbl, at, count)?;
            Ok(t.group.insert_empty_row(tbl, at, count)?)
        })
    }

    /// Removes a row with move-last-over semantics. See
    /// [`Group::move_last_over`].
    pub fn move_last_over(&mut self, tbl: usize, row: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.move_last_over(tbl, row)?;
            Ok(t.group.move_last_over(tbl, row)?)
        })
    }

    /// Removes every row of a table. See [`Group::clear`].
    pub fn clear(&mut self, tbl: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.clear(tbl)?;
            Ok(t.group.clear(tbl)?)
        })
    }

    /// Merges two rows. See [`Group::merge_rows`].
    pub fn merge_rows(&mut self, tbl: usize, from: usize, to: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.merge_rows(tbl, from, to)?;
            Ok(t.group.merge_rows(tbl, from, to)?)
        })
    }

    /// Appends a keyed row. See [`Group::add_row_with_key`].
    pub fn add_row_with_key(&mut self, tbl: usize, col: usize, key: i64) -> ReplResult<usize> {
        self.op(|t| {
            t.recorder.add_row_with_key(tbl, col, key)?;
            Ok(t.group.add_row_with_key(tbl, col, key)?)
        })
    }

    // ---- cell operations ------------------------------------------------

    /// Sets an integer cell.
    pub fn set_int(&mut self, tbl: usize, col: usize, row: usize, value: i64) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_int(tbl, col, row, value)?;
            Ok(t.group.set_int(tbl, col, row, value)?)
        })
    }

    /// Sets a boolean cell.
    pub fn set_bool(&mut self, tbl: usize, col: usize, row: usize, value: bool) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_bool(tbl, col, row, value)?;
            Ok(t.group.set_bool(tbl, col, row, value)?)
        })
    }

    /// Sets a float cell.
    pub fn set_float(&mut self, tbl: usize, col: usize, row: usize, value: f32) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_float(tbl, col, row, value)?;
            Ok(t.group.set_float(tbl, col, row, value)?)
        })
    }

    /// Sets a double cell.
    pub fn set_double(&mut self, tbl: usize, col: usize, row: usize, value: f64) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_double(tbl, col, row, value)?;
            Ok(t.group.set_double(tbl, col, row, value)?)
        })
    }

    /// Sets a string cell.
    pub fn set_string(&mut self, tbl: usize, col: usize, row: usize, value: &str) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_string(tbl, col, row, value)?;
            Ok(t.group.set_string(tbl, col, row, value)?)
        })
    }

    /// Sets a binary cell.
    pub fn set_binary(&mut self, tbl: usize, col: usize, row: usize, value: &[u8]) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_binary(tbl, col, row, value)?;
            Ok(t.group.set_binary(tbl, col, row, value)?)
        })
    }

    /// Sets a timestamp cell.
    pub fn set_timestamp(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: Timestamp,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_timestamp(tbl, col, row, value)?;
            Ok(t.group.set_timestamp(tbl, col, row, value)?)
        })
    }

    /// Sets a legacy datetime cell.
    pub fn set_old_datetime(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: i64,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_old_datetime(tbl, col, row, value)?;
            Ok(t.group.set_old_datetime(tbl, col, row, value)?)
        })
    }

    /// Sets a mixed cell.
    pub fn set_mixed(&mut self, tbl: usize, col: usize, row: usize, value: Mixed) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_mixed(tbl, col, row, &value)?;
            Ok(t.group.set_mixed(tbl, col, row, value)?)
        })
    }

    /// Sets a nullable scalar cell to null.
    pub fn set_null(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_null(tbl, col, row)?;
            Ok(t.group.set_null(tbl, col, row)?)
        })
    }

    /// Sets an integer cell enforcing uniqueness. See
    /// [`Group::set_int_unique`].
    pub fn set_int_unique(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: i64,
    ) -> ReplResult<usize> {
        self.op(|t| {
            t.recorder.set_int_unique(tbl, col, row, value)?;
            Ok(t.group.set_int_unique(tbl, col, row, value)?)
        })
    }

    /// Sets a string cell enforcing uniqueness.
    pub fn set_string_unique(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: &str,
    ) -> ReplResult<usize> {
        self.op(|t| {
            t.recorder.set_string_unique(tbl, col, row, value)?;
            Ok(t.group.set_string_unique(tbl, col, row, value)?)
        })
    }

    /// Sets a nullable cell to null enforcing uniqueness of null.
    pub fn set_null_unique(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<usize> {
        self.op(|t| {
            t.recorder.set_null_unique(tbl, col, row)?;
            Ok(t.group.set_null_unique(tbl, col, row)?)
        })
    }

    /// Inserts text into a string cell.
    pub fn insert_substring(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        pos: usize,
        value: &str,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.insert_substring(tbl, col, row, pos, value)?;
            Ok(t.group.insert_substring(tbl, col, row, pos, value)?)
        })
    }

    /// Removes bytes from a string cell.
    pub fn remove_substring(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        pos: usize,
        len: usize,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.remove_substring(tbl, col, row, pos, len)?;
            Ok(t.group.remove_substring(tbl, col, row, pos, len)?)
        })
    }

    // ---- link operations ------------------------------------------------

    /// Sets a link cell. See [`Group::set_link`].
    pub fn set_link(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        target: Option<usize>,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.set_link(tbl, col, row, target)?;
            Ok(t.group.set_link(tbl, col, row, target)?)
        })
    }

    /// Nullifies a link cell.
    pub fn nullify_link(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.nullify_link(tbl, col, row)?;
            Ok(t.group.nullify_link(tbl, col, row)?)
        })
    }

    /// Appends to a link list.
    pub fn link_list_add(&mut self, tbl: usize, col: usize, row: usize, target: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.link_list_add(tbl, col, row, target)?;
            Ok(t.group.link_list_add(tbl, col, row, target)?)
        })
    }

    /// Inserts into a link list.
    pub fn link_list_insert(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        index: usize,
        target: usize,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.link_list_insert(tbl, col, row, index, target)?;
            Ok(t.group.link_list_insert(tbl, col, row, index, target)?)
        })
    }

    /// Overwrites a link list entry. See [`Group::link_list_set`].
    pub fn link_list_set(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        index: usize,
        target: usize,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.link_list_set(tbl, col, row, index, target)?;
            Ok(t.group.link_list_set(tbl, col, row, index, target)?)
        })
    }

    /// Removes a link list entry.
    pub fn link_list_erase(&mut self, tbl: usize, col: usize, row: usize, index: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.link_list_erase(tbl, col, row, index)?;
            Ok(t.group.link_list_erase(tbl, col, row, index)?)
        })
    }

    /// Nullifies a link list entry.
    pub fn link_list_nullify(&mut self, tbl: usize, col: usize, row: usize, index: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.link_list_nullify(tbl, col, row, index)?;
            Ok(t.group.link_list_nullify(tbl, col, row, index)?)
        })
    }

    /// Moves a link list entry.
    pub fn link_list_move(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        from: usize,
        to: usize,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.link_list_move(tbl, col, row, from, to)?;
            Ok(t.group.link_list_move(tbl, col, row, from, to)?)
        })
    }

    /// Swaps two link list entries.
    pub fn link_list_swap(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        a: usize,
        b: usize,
    ) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.link_list_swap(tbl, col, row, a, b)?;
            Ok(t.group.link_list_swap(tbl, col, row, a, b)?)
        })
    }

    /// Clears a link list.
    pub fn link_list_clear(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<()> {
        self.op(|t| {
            t.recorder.link_list_clear(tbl, col, row)?;
            Ok(t.group.link_list_clear(tbl, col, row)?)
        })
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            if let Some(snapshot) = self.snapshot.take() {
                *self.group = snapshot;
            }
        }
    }
}
