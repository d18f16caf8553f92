//! The group: an ordered collection of tables and the mutation API.
//!
//! All mutation happens at group level because link operations touch two
//! tables at once (the forward cell on the origin, the backlink entry on
//! the target). Tables are addressed by dense indices into an arena; no
//! cross-table pointers exist, so reordering or erasing a table is a pure
//! index remap.
//!
//! Every operation restores link-graph integrity before returning:
//! forward links and backlink entries always agree (with multiplicity),
//! and breaking the last incoming strong reference to a row deletes the
//! row through the cascade engine.

use crate::column::{Column, ColumnData};
use crate::descriptor::{self, ColumnDescriptor, LinkTarget};
use crate::error::{CoreError, CoreResult};
use crate::notice::ChangeNotice;
use crate::table::{BacklinkColumn, Table};
use crate::types::{ColumnType, LinkStrength, Mixed, Timestamp};

/// An in-memory group of tables.
///
/// The group is the unit of transactional mutation and of replication:
/// replaying a changeset against an empty group reproduces the source
/// group exactly, including backlink bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Group {
    tables: Vec<Table>,
    notices: Vec<ChangeNotice>,
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        // The notice buffer is transient host state, not group content.
        self.tables == other.tables
    }
}

impl Group {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Returns the table at `idx`.
    pub fn table(&self, idx: usize) -> CoreResult<&Table> {
        self.tables
            .get(idx)
            .ok_or(CoreError::NoSuchTable { table: idx })
    }

    /// Finds a table by name.
    pub fn table_by_name(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    /// Returns true if the group holds any strong link column.
    pub fn has_strong_columns(&self) -> bool {
        self.tables.iter().any(|t| {
            t.columns
                .iter()
                .any(|c| matches!(c.desc.link, Some(lt) if lt.strength == LinkStrength::Strong))
        })
    }

    /// Drains the pending change notices.
    pub fn take_notices(&mut self) -> Vec<ChangeNotice> {
        std::mem::take(&mut self.notices)
    }

    // ---- group-level operations -----------------------------------------

    /// Appends a new table with the given name.
    pub fn add_table(&mut self, name: &str) -> CoreResult<usize> {
        if self.table_by_name(name).is_some() {
            return Err(CoreError::DuplicateTableName { name: name.into() });
        }
        self.tables.push(Table::new(name.into()));
        let table = self.tables.len() - 1;
        self.notices.push(ChangeNotice::TableInserted { table });
        Ok(table)
    }

    /// Renames the table at `idx`.
    pub fn rename_table(&mut self, idx: usize, name: &str) -> CoreResult<()> {
        self.table(idx)?;
        if let Some(other) = self.table_by_name(name) {
            if other != idx {
                return Err(CoreError::DuplicateTableName { name: name.into() });
            }
        }
        self.tables[idx].name = name.into();
        Ok(())
    }

    /// Moves the table at `from` to position `to`.
    pub fn move_table(&mut self, from: usize, to: usize) -> CoreResult<()> {
        self.table(from)?;
        self.table(to)?;
        if from == to {
            return Ok(());
        }
        let table = self.tables.remove(from);
        self.tables.insert(to, table);
        self.remap_table_refs(|i| remap_index(i, from, to));
        self.notices.push(ChangeNotice::TableMoved { from, to });
        Ok(())
    }

    /// Erases the table at `idx`.
    ///
    /// Fails with [`CoreError::CrossTableLinkTarget`] while any row of
    /// another table still references a row of this table. A table with no
    /// incoming row references (in particular, any empty table) is always
    /// erasable; link columns in other tables that target it are erased
    /// with it.
    pub fn erase_table(&mut self, idx: usize) -> CoreResult<()> {
        self.table(idx)?;
        let referenced = self.tables[idx]
            .backlinks
            .iter()
            .any(|bc| bc.origin_table != idx && bc.rows.iter().any(|r| !r.is_empty()));
        if referenced {
            return Err(CoreError::CrossTableLinkTarget);
        }

        // Link columns elsewhere that target this table hold no values at
        // this point; erase them so no dangling target reference survives.
        loop {
            let mut found = None;
            'outer: for (o, table) in self.tables.iter().enumerate() {
                if o == idx {
                    continue;
                }
                for (c, column) in table.columns.iter().enumerate() {
                    if matches!(column.desc.link, Some(lt) if lt.table == idx) {
                        found = Some((o, c));
                        break 'outer;
                    }
                }
            }
            match found {
                Some((o, c)) => self.erase_column(o, c)?,
                None => break,
            }
        }

        // Backlink bookkeeping elsewhere for this table's outgoing links.
        for table in &mut self.tables {
            table.backlinks.retain(|bc| bc.origin_table != idx);
        }

        self.tables.remove(idx);
        self.remap_table_refs(|i| if i > idx { i - 1 } else { i });
        self.notices.push(ChangeNotice::TableErased { table: idx });
        Ok(())
    }

    // ---- schema operations ----------------------------------------------

    /// Appends a scalar column to the table at `tbl`.
    pub fn add_column(
        &mut self,
        tbl: usize,
        ty: ColumnType,
        name: &str,
        nullable: bool,
    ) -> CoreResult<usize> {
        let col = self.table(tbl)?.column_count();
        self.insert_column(tbl, col, ty, name, nullable)?;
        Ok(col)
    }

    /// Inserts a scalar column at (`tbl`, `col`).
    pub fn insert_column(
        &mut self,
        tbl: usize,
        col: usize,
        ty: ColumnType,
        name: &str,
        nullable: bool,
    ) -> CoreResult<()> {
        if ty.is_link_type() {
            return Err(CoreError::invalid_operation(
                "link columns require a target table; use insert_column_link",
            ));
        }
        self.insert_column_at(tbl, &[], col, ty, name, nullable, None)
    }

    /// Appends a link column to the table at `tbl`.
    ///
    /// The paired backlink column on the target table is created in the
    /// same step.
    pub fn add_column_link(
        &mut self,
        tbl: usize,
        ty: ColumnType,
        name: &str,
        target: usize,
        strength: LinkStrength,
    ) -> CoreResult<usize> {
        let col = self.table(tbl)?.column_count();
        self.insert_column_link(tbl, col, ty, name, target, strength)?;
        Ok(col)
    }

    /// Inserts a link column at (`tbl`, `col`).
    pub fn insert_column_link(
        &mut self,
        tbl: usize,
        col: usize,
        ty: ColumnType,
        name: &str,
        target: usize,
        strength: LinkStrength,
    ) -> CoreResult<()> {
        if !ty.is_link_type() {
            return Err(CoreError::invalid_operation(
                "insert_column_link requires a Link or LinkList type",
            ));
        }
        self.insert_column_at(tbl, &[], col, ty, name, false, Some((target, strength)))
    }

    /// Inserts a column at `col` of the descriptor addressed by `path`
    /// within the table at `tbl`. An empty path addresses the table root.
    ///
    /// `link` must be present exactly when `ty` is a link type; link
    /// columns are not allowed in nested descriptors.
    pub fn insert_column_at(
        &mut self,
        tbl: usize,
        path: &[usize],
        col: usize,
        ty: ColumnType,
        name: &str,
        nullable: bool,
        link: Option<(usize, LinkStrength)>,
    ) -> CoreResult<()> {
        self.table(tbl)?;
        if ty.is_link_type() != link.is_some() {
            return Err(CoreError::invalid_operation(
                "link target present iff the column type is a link type",
            ));
        }

        if !path.is_empty() {
            if link.is_some() {
                return Err(CoreError::invalid_descriptor(
                    "link columns are not allowed in nested descriptors",
                ));
            }
            let cols = self.nested_desc_mut(tbl, path)?;
            if col > cols.len() {
                return Err(CoreError::NoSuchColumn { col });
            }
            cols.insert(col, ColumnDescriptor::scalar(name, ty, nullable));
            return Ok(());
        }

        if let Some((target, _)) = link {
            self.table(target)?;
        }
        if col > self.tables[tbl].columns.len() {
            return Err(CoreError::NoSuchColumn { col });
        }

        let desc = ColumnDescriptor {
            name: name.into(),
            ty,
            nullable: if link.is_some() { false } else { nullable },
            indexed: false,
            link: link.map(|(table, strength)| LinkTarget { table, strength }),
            nested: Vec::new(),
        };
        let rows = self.tables[tbl].size;
        self.tables[tbl].columns.insert(col, Column::new(desc, rows));

        // Backlink columns elsewhere key their origin by column index.
        self.shift_origin_cols(tbl, col, 1);
        if let Some((target, _)) = link {
            let target_rows = self.tables[target].size;
            self.tables[target].backlinks.push(BacklinkColumn {
                origin_table: tbl,
                origin_col: col,
                rows: vec![Vec::new(); target_rows],
            });
        }
        self.notices.push(ChangeNotice::ColumnInserted { table: tbl, col });
        Ok(())
    }

    /// Erases the column at (`tbl`, `col`).
    ///
    /// Erasing a link column drops its forward links and the paired
    /// backlink column without cascading. Erasing the last column empties
    /// the table.
    pub fn erase_column(&mut self, tbl: usize, col: usize) -> CoreResult<()> {
        self.erase_column_at(tbl, &[], col)
    }

    /// Erases a column of the descriptor addressed by `path`.
    pub fn erase_column_at(&mut self, tbl: usize, path: &[usize], col: usize) -> CoreResult<()> {
        self.table(tbl)?;
        if !path.is_empty() {
            let cols = self.nested_desc_mut(tbl, path)?;
            if col >= cols.len() {
                return Err(CoreError::NoSuchColumn { col });
            }
            cols.remove(col);
            return Ok(());
        }

        if col >= self.tables[tbl].columns.len() {
            return Err(CoreError::NoSuchColumn { col });
        }
        let link = self.tables[tbl].columns[col].desc.link;
        if let Some(lt) = link {
            self.tables[lt.table]
                .backlinks
                .retain(|bc| !(bc.origin_table == tbl && bc.origin_col == col));
        }
        self.tables[tbl].columns.remove(col);
        self.shift_origin_cols_above(tbl, col);
        self.notices.push(ChangeNotice::ColumnErased { table: tbl, col });

        // Removing the last column leaves nothing for rows to hold.
        if self.tables[tbl].columns.is_empty() && self.tables[tbl].size > 0 {
            self.clear(tbl)?;
        }
        Ok(())
    }

    /// Renames the column at (`tbl`, `col`).
    pub fn rename_column(&mut self, tbl: usize, col: usize, name: &str) -> CoreResult<()> {
        self.rename_column_at(tbl, &[], col, name)
    }

    /// Renames a column of the descriptor addressed by `path`.
    pub fn rename_column_at(
        &mut self,
        tbl: usize,
        path: &[usize],
        col: usize,
        name: &str,
    ) -> CoreResult<()> {
        self.table(tbl)?;
        if !path.is_empty() {
            let cols = self.nested_desc_mut(tbl, path)?;
            let desc = cols.get_mut(col).ok_or(CoreError::NoSuchColumn { col })?;
            desc.name = name.into();
            return Ok(());
        }
        let table = &mut self.tables[tbl];
        let column = table
            .columns
            .get_mut(col)
            .ok_or(CoreError::NoSuchColumn { col })?;
        column.desc.name = name.into();
        Ok(())
    }

    /// Moves the column at `from` to position `to` within the table.
    pub fn move_column(&mut self, tbl: usize, from: usize, to: usize) -> CoreResult<()> {
        self.move_column_at(tbl, &[], from, to)
    }

    /// Moves a column of the descriptor addressed by `path`.
    pub fn move_column_at(
        &mut self,
        tbl: usize,
        path: &[usize],
        from: usize,
        to: usize,
    ) -> CoreResult<()> {
        self.table(tbl)?;
        if !path.is_empty() {
            let cols = self.nested_desc_mut(tbl, path)?;
            if from >= cols.len() {
                return Err(CoreError::NoSuchColumn { col: from });
            }
            if to >= cols.len() {
                return Err(CoreError::NoSuchColumn { col: to });
            }
            let desc = cols.remove(from);
            cols.insert(to, desc);
            return Ok(());
        }

        let len = self.tables[tbl].columns.len();
        if from >= len {
            return Err(CoreError::NoSuchColumn { col: from });
        }
        if to >= len {
            return Err(CoreError::NoSuchColumn { col: to });
        }
        if from == to {
            return Ok(());
        }
        let column = self.tables[tbl].columns.remove(from);
        self.tables[tbl].columns.insert(to, column);
        for table in &mut self.tables {
            for bc in &mut table.backlinks {
                if bc.origin_table == tbl {
                    bc.origin_col = remap_index(bc.origin_col, from, to);
                }
            }
        }
        self.notices
            .push(ChangeNotice::ColumnMoved { table: tbl, from, to });
        Ok(())
    }

    /// Adds a search index to the column at (`tbl`, `col`).
    pub fn add_search_index(&mut self, tbl: usize, col: usize) -> CoreResult<()> {
        self.set_search_index(tbl, col, true)
    }

    /// Removes the search index from the column at (`tbl`, `col`).
    pub fn remove_search_index(&mut self, tbl: usize, col: usize) -> CoreResult<()> {
        self.set_search_index(tbl, col, false)
    }

    fn set_search_index(&mut self, tbl: usize, col: usize, indexed: bool) -> CoreResult<()> {
        self.table(tbl)?;
        let table = &mut self.tables[tbl];
        let column = table
            .columns
            .get_mut(col)
            .ok_or(CoreError::NoSuchColumn { col })?;
        if column.desc.ty.is_link_type() || column.desc.ty == ColumnType::Table {
            return Err(CoreError::invalid_operation(
                "search indexes apply to scalar columns only",
            ));
        }
        column.desc.indexed = indexed;
        Ok(())
    }

    // ---- row operations -------------------------------------------------

    /// Appends `count` empty rows and returns the index of the first.
    pub fn add_empty_row(&mut self, tbl: usize, count: usize) -> CoreResult<usize> {
        let first = self.table(tbl)?.size;
        self.tables[tbl].append_rows(count);
        if count > 0 {
            self.notices.push(ChangeNotice::RowsInserted {
                table: tbl,
                row: first,
                count,
            });
        }
        Ok(first)
    }

    /// Inserts `count` empty rows at `at`, shifting subsequent rows up.
    ///
    /// Incoming references to shifted rows are rebased.
    pub fn insert_empty_row(&mut self, tbl: usize, at: usize, count: usize) -> CoreResult<()> {
        let size = self.table(tbl)?.size;
        if at > size {
            return Err(CoreError::RowOutOfRange { row: at, size });
        }
        if count == 0 {
            return Ok(());
        }
        self.shift_forward_refs(tbl, at, count);
        self.shift_backlink_origins(tbl, at, count);
        self.tables[tbl].insert_rows(at, count);
        self.notices.push(ChangeNotice::RowsInserted {
            table: tbl,
            row: at,
            count,
        });
        Ok(())
    }

    /// Removes the row at `row`, swapping the last row into its place.
    ///
    /// Incoming references to the removed row are broken; incoming
    /// references to the moved last row are rebased in place. Strong
    /// references held by the removed row cascade.
    pub fn move_last_over(&mut self, tbl: usize, row: usize) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        let mut seeds = self.collect_strong_seeds_of_row(tbl, row);
        let last = self.tables[tbl].size - 1;
        self.erase_row_now(tbl, row);
        if row != last {
            for seed in &mut seeds {
                if seed.0 == tbl && seed.1 == last {
                    seed.1 = row;
                }
            }
        }
        self.run_cascade(seeds);
        Ok(())
    }

    /// Removes every row of the table.
    ///
    /// Incoming references become null (links) or disappear (list
    /// entries); no row of any other table is deleted unless it was
    /// strongly owned by a cleared row.
    pub fn clear(&mut self, tbl: usize) -> CoreResult<()> {
        self.table(tbl)?;

        // Strong references held by the cleared rows into other tables.
        let mut seeds = Vec::new();
        for c in 0..self.tables[tbl].columns.len() {
            let Some(lt) = self.tables[tbl].columns[c].desc.link else {
                continue;
            };
            if lt.strength != LinkStrength::Strong || lt.table == tbl {
                continue;
            }
            for row in 0..self.tables[tbl].size {
                for v in self.link_cell_values(tbl, c, row) {
                    seeds.push((lt.table, v));
                }
            }
        }

        // Break incoming references from other tables.
        for o in 0..self.tables.len() {
            if o == tbl {
                continue;
            }
            for column in &mut self.tables[o].columns {
                if !matches!(column.desc.link, Some(lt) if lt.table == tbl) {
                    continue;
                }
                match &mut column.data {
                    ColumnData::Link(v) => v.iter_mut().for_each(|cell| *cell = None),
                    ColumnData::LinkList(v) => v.iter_mut().for_each(Vec::clear),
                    _ => {}
                }
            }
        }

        // Backlink entries elsewhere recording this table's outgoing links.
        for o in 0..self.tables.len() {
            if o == tbl {
                continue;
            }
            for bc in &mut self.tables[o].backlinks {
                if bc.origin_table == tbl {
                    bc.rows.iter_mut().for_each(Vec::clear);
                }
            }
        }

        self.tables[tbl].clear_rows();
        self.notices.push(ChangeNotice::TableCleared { table: tbl });
        self.run_cascade(seeds);
        Ok(())
    }

    /// Re-points every incoming reference from `from` to `to`, then
    /// deletes `from` via [`Group::move_last_over`]. Cell values of `to`
    /// are untouched.
    pub fn merge_rows(&mut self, tbl: usize, from: usize, to: usize) -> CoreResult<()> {
        self.table(tbl)?.check_row(from)?;
        self.tables[tbl].check_row(to)?;
        if from == to {
            return Err(CoreError::invalid_operation(
                "merge_rows requires two distinct rows",
            ));
        }
        for b in 0..self.tables[tbl].backlinks.len() {
            let (o_tbl, o_col, moved) = {
                let bc = &mut self.tables[tbl].backlinks[b];
                (
                    bc.origin_table,
                    bc.origin_col,
                    std::mem::take(&mut bc.rows[from]),
                )
            };
            for &o_row in &moved {
                self.forward_replace_one(o_tbl, o_col, o_row, from, to);
            }
            self.tables[tbl].backlinks[b].rows[to].extend(moved);
        }
        self.move_last_over(tbl, from)
    }

    /// Appends a row and sets `key` in the integer column `col`, keeping
    /// a pre-existing row holding `key` instead if one exists.
    ///
    /// Returns the index of the row that holds `key` afterwards.
    pub fn add_row_with_key(&mut self, tbl: usize, col: usize, key: i64) -> CoreResult<usize> {
        let column = self.table(tbl)?.check_col(col)?;
        if column.desc.ty != ColumnType::Int {
            return Err(CoreError::TypeMismatch {
                expected: ColumnType::Int,
                actual: column.desc.ty,
            });
        }
        let row = self.add_empty_row(tbl, 1)?;
        self.set_int_unique(tbl, col, row, key)
    }

    // ---- scalar cell operations -----------------------------------------

    /// Sets an integer cell.
    pub fn set_int(&mut self, tbl: usize, col: usize, row: usize, value: i64) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::Int)?.data {
            ColumnData::Int(v) => v[row] = Some(value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a boolean cell.
    pub fn set_bool(&mut self, tbl: usize, col: usize, row: usize, value: bool) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::Bool)?.data {
            ColumnData::Bool(v) => v[row] = Some(value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a float cell.
    pub fn set_float(&mut self, tbl: usize, col: usize, row: usize, value: f32) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::Float)?.data {
            ColumnData::Float(v) => v[row] = Some(value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a double cell.
    pub fn set_double(&mut self, tbl: usize, col: usize, row: usize, value: f64) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::Double)?.data {
            ColumnData::Double(v) => v[row] = Some(value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a string cell. An empty string is distinct from null.
    pub fn set_string(&mut self, tbl: usize, col: usize, row: usize, value: &str) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::String)?.data {
            ColumnData::String(v) => v[row] = Some(value.into()),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a binary cell. An empty blob is distinct from null.
    pub fn set_binary(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: &[u8],
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::Binary)?.data {
            ColumnData::Binary(v) => v[row] = Some(value.into()),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a legacy datetime cell.
    pub fn set_old_datetime(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: i64,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self
            .tables[tbl]
            .typed_col_mut(col, ColumnType::OldDateTime)?
            .data
        {
            ColumnData::OldDateTime(v) => v[row] = Some(value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a timestamp cell.
    pub fn set_timestamp(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: Timestamp,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self
            .tables[tbl]
            .typed_col_mut(col, ColumnType::Timestamp)?
            .data
        {
            ColumnData::Timestamp(v) => v[row] = Some(value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a mixed cell.
    pub fn set_mixed(&mut self, tbl: usize, col: usize, row: usize, value: Mixed) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::Mixed)?.data {
            ColumnData::Mixed(v) => v[row] = Some(value),
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Sets a nullable scalar cell to null.
    ///
    /// Distinct from writing zero or an empty string; links are nullified
    /// through [`Group::nullify_link`] instead.
    pub fn set_null(&mut self, tbl: usize, col: usize, row: usize) -> CoreResult<()> {
        self.table(tbl)?.check_cell(col, row)?;
        let column = &self.tables[tbl].columns[col];
        if column.desc.ty.is_link_type() || column.desc.ty == ColumnType::Table {
            return Err(CoreError::invalid_operation(
                "set_null applies to scalar cells; use nullify_link for links",
            ));
        }
        if !column.desc.nullable {
            return Err(CoreError::NotNullable { col });
        }
        self.tables[tbl].columns[col].data.set_null(row);
        Ok(())
    }

    /// Sets an integer cell to `value`, enforcing uniqueness.
    ///
    /// If another row already holds `value`, that row is kept and `row`
    /// (which must be freshly inserted with default cells) is removed via
    /// move-last-over. Returns the index of the row holding `value`.
    pub fn set_int_unique(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: i64,
    ) -> CoreResult<usize> {
        self.table(tbl)?.check_row(row)?;
        let existing = match &self.tables[tbl].typed_col_mut(col, ColumnType::Int)?.data {
            ColumnData::Int(v) => v
                .iter()
                .enumerate()
                .find(|(r, cell)| *r != row && **cell == Some(value))
                .map(|(r, _)| r),
            _ => unreachable!(),
        };
        self.finish_set_unique(tbl, col, row, existing, |group| {
            group.set_int(tbl, col, row, value)
        })
    }

    /// Sets a string cell to `value`, enforcing uniqueness. See
    /// [`Group::set_int_unique`].
    pub fn set_string_unique(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: &str,
    ) -> CoreResult<usize> {
        self.table(tbl)?.check_row(row)?;
        let existing = match &self.tables[tbl].typed_col_mut(col, ColumnType::String)?.data {
            ColumnData::String(v) => v
                .iter()
                .enumerate()
                .find(|(r, cell)| *r != row && cell.as_deref() == Some(value))
                .map(|(r, _)| r),
            _ => unreachable!(),
        };
        let value = value.to_owned();
        self.finish_set_unique(tbl, col, row, existing, move |group| {
            group.set_string(tbl, col, row, &value)
        })
    }

    /// Sets a nullable cell to null, enforcing uniqueness of null. See
    /// [`Group::set_int_unique`].
    pub fn set_null_unique(&mut self, tbl: usize, col: usize, row: usize) -> CoreResult<usize> {
        self.table(tbl)?.check_cell(col, row)?;
        let column = &self.tables[tbl].columns[col];
        if !column.desc.nullable {
            return Err(CoreError::NotNullable { col });
        }
        let existing = (0..self.tables[tbl].size)
            .find(|&r| r != row && self.tables[tbl].columns[col].data.is_null(r));
        self.finish_set_unique(tbl, col, row, existing, |group| {
            group.set_null(tbl, col, row)
        })
    }

    fn finish_set_unique(
        &mut self,
        tbl: usize,
        _col: usize,
        row: usize,
        existing: Option<usize>,
        set: impl FnOnce(&mut Self) -> CoreResult<()>,
    ) -> CoreResult<usize> {
        match existing {
            Some(other) => {
                let last = self.tables[tbl].size - 1;
                self.move_last_over(tbl, row)?;
                Ok(if other == last { row } else { other })
            }
            None => {
                set(self)?;
                Ok(row)
            }
        }
    }

    /// Inserts `value` into a string cell at byte position `pos`.
    pub fn insert_substring(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        pos: usize,
        value: &str,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::String)?.data {
            ColumnData::String(v) => {
                let Some(s) = v[row].as_mut() else {
                    return Err(CoreError::invalid_operation("cannot edit a null string"));
                };
                if pos > s.len() || !s.is_char_boundary(pos) {
                    return Err(CoreError::SubstringOutOfBounds { pos, len: s.len() });
                }
                s.insert_str(pos, value);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Removes `len` bytes from a string cell starting at byte position
    /// `pos`. Removal is clamped to the end of the string.
    pub fn remove_substring(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        pos: usize,
        len: usize,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        match &mut self.tables[tbl].typed_col_mut(col, ColumnType::String)?.data {
            ColumnData::String(v) => {
                let Some(s) = v[row].as_mut() else {
                    return Err(CoreError::invalid_operation("cannot edit a null string"));
                };
                if pos > s.len() || !s.is_char_boundary(pos) {
                    return Err(CoreError::SubstringOutOfBounds { pos, len: s.len() });
                }
                let end = pos.saturating_add(len).min(s.len());
                if !s.is_char_boundary(end) {
                    return Err(CoreError::SubstringOutOfBounds {
                        pos: end,
                        len: s.len(),
                    });
                }
                s.drain(pos..end);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    // ---- link operations ------------------------------------------------

    /// Sets a link cell. `None` writes a null link.
    ///
    /// Overwriting a strong reference cascades its previous target;
    /// rewriting the same value is a no-op.
    pub fn set_link(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        target: Option<usize>,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        let lt = self.link_column(tbl, col, ColumnType::Link)?;
        if let Some(t) = target {
            let size = self.tables[lt.table].size;
            if t >= size {
                return Err(CoreError::LinkTargetOutOfRange { target: t, size });
            }
        }
        let old = match &self.tables[tbl].columns[col].data {
            ColumnData::Link(v) => v[row],
            _ => unreachable!(),
        };
        if old == target {
            return Ok(());
        }
        match &mut self.tables[tbl].columns[col].data {
            ColumnData::Link(v) => v[row] = target,
            _ => unreachable!(),
        }
        if let Some(o) = old {
            let bc = self.tables[lt.table].backlink_col_mut(tbl, col);
            remove_one(&mut bc.rows[o], row);
        }
        if let Some(t) = target {
            self.tables[lt.table].backlink_col_mut(tbl, col).rows[t].push(row);
        }
        if lt.strength == LinkStrength::Strong {
            if let Some(o) = old {
                self.run_cascade(vec![(lt.table, o)]);
            }
        }
        Ok(())
    }

    /// Nullifies a link cell.
    pub fn nullify_link(&mut self, tbl: usize, col: usize, row: usize) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        self.link_column(tbl, col, ColumnType::Link)?;
        self.set_link(tbl, col, row, None)
    }

    /// Appends `target` to a link list.
    pub fn link_list_add(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        target: usize,
    ) -> CoreResult<()> {
        let len = self.link_list(tbl, col, row)?.len();
        self.link_list_insert(tbl, col, row, len, target)
    }

    /// Inserts `target` at `index` of a link list.
    pub fn link_list_insert(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        index: usize,
        target: usize,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        let lt = self.link_column(tbl, col, ColumnType::LinkList)?;
        let size = self.tables[lt.table].size;
        if target >= size {
            return Err(CoreError::LinkTargetOutOfRange { target, size });
        }
        match &mut self.tables[tbl].columns[col].data {
            ColumnData::LinkList(v) => {
                let list = &mut v[row];
                if index > list.len() {
                    return Err(CoreError::ListIndexOutOfRange {
                        index,
                        len: list.len(),
                    });
                }
                list.insert(index, target);
            }
            _ => unreachable!(),
        }
        self.tables[lt.table].backlink_col_mut(tbl, col).rows[target].push(row);
        Ok(())
    }

    /// Overwrites the entry at `index` of a link list.
    ///
    /// Writing the value already present is a no-op and in particular
    /// never cascades the old target.
    pub fn link_list_set(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        index: usize,
        target: usize,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        let lt = self.link_column(tbl, col, ColumnType::LinkList)?;
        let size = self.tables[lt.table].size;
        if target >= size {
            return Err(CoreError::LinkTargetOutOfRange { target, size });
        }
        let old = match &mut self.tables[tbl].columns[col].data {
            ColumnData::LinkList(v) => {
                let list = &mut v[row];
                let Some(slot) = list.get_mut(index) else {
                    return Err(CoreError::ListIndexOutOfRange {
                        index,
                        len: list.len(),
                    });
                };
                let old = *slot;
                if old == target {
                    return Ok(());
                }
                *slot = target;
                old
            }
            _ => unreachable!(),
        };
        let bc = self.tables[lt.table].backlink_col_mut(tbl, col);
        remove_one(&mut bc.rows[old], row);
        bc.rows[target].push(row);
        if lt.strength == LinkStrength::Strong {
            self.run_cascade(vec![(lt.table, old)]);
        }
        Ok(())
    }

    /// Removes the entry at `index` of a link list.
    pub fn link_list_erase(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        index: usize,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        let lt = self.link_column(tbl, col, ColumnType::LinkList)?;
        let old = match &mut self.tables[tbl].columns[col].data {
            ColumnData::LinkList(v) => {
                let list = &mut v[row];
                if index >= list.len() {
                    return Err(CoreError::ListIndexOutOfRange {
                        index,
                        len: list.len(),
                    });
                }
                list.remove(index)
            }
            _ => unreachable!(),
        };
        let bc = self.tables[lt.table].backlink_col_mut(tbl, col);
        remove_one(&mut bc.rows[old], row);
        if lt.strength == LinkStrength::Strong {
            self.run_cascade(vec![(lt.table, old)]);
        }
        Ok(())
    }

    /// Nullifies the entry at `index` of a link list.
    ///
    /// Applies exactly as [`Group::link_list_erase`]; the two are distinct
    /// operations on the wire.
    pub fn link_list_nullify(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        index: usize,
    ) -> CoreResult<()> {
        self.link_list_erase(tbl, col, row, index)
    }

    /// Moves the entry at `from` to position `to` within a link list.
    pub fn link_list_move(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        from: usize,
        to: usize,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        self.link_column(tbl, col, ColumnType::LinkList)?;
        match &mut self.tables[tbl].columns[col].data {
            ColumnData::LinkList(v) => {
                let list = &mut v[row];
                if from >= list.len() {
                    return Err(CoreError::ListIndexOutOfRange {
                        index: from,
                        len: list.len(),
                    });
                }
                if to >= list.len() {
                    return Err(CoreError::ListIndexOutOfRange {
                        index: to,
                        len: list.len(),
                    });
                }
                let entry = list.remove(from);
                list.insert(to, entry);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Swaps the entries at `a` and `b` of a link list. `a == b` is a
    /// valid no-op.
    pub fn link_list_swap(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        a: usize,
        b: usize,
    ) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        self.link_column(tbl, col, ColumnType::LinkList)?;
        match &mut self.tables[tbl].columns[col].data {
            ColumnData::LinkList(v) => {
                let list = &mut v[row];
                if a >= list.len() {
                    return Err(CoreError::ListIndexOutOfRange {
                        index: a,
                        len: list.len(),
                    });
                }
                if b >= list.len() {
                    return Err(CoreError::ListIndexOutOfRange {
                        index: b,
                        len: list.len(),
                    });
                }
                list.swap(a, b);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Removes every entry of a link list.
    pub fn link_list_clear(&mut self, tbl: usize, col: usize, row: usize) -> CoreResult<()> {
        self.table(tbl)?.check_row(row)?;
        let lt = self.link_column(tbl, col, ColumnType::LinkList)?;
        let olds = match &mut self.tables[tbl].columns[col].data {
            ColumnData::LinkList(v) => std::mem::take(&mut v[row]),
            _ => unreachable!(),
        };
        {
            let bc = self.tables[lt.table].backlink_col_mut(tbl, col);
            for &old in &olds {
                remove_one(&mut bc.rows[old], row);
            }
        }
        if lt.strength == LinkStrength::Strong {
            self.run_cascade(olds.into_iter().map(|o| (lt.table, o)).collect());
        }
        Ok(())
    }

    /// Counts backlinks into (`tbl`, `row`) through the given origin
    /// column.
    pub fn backlink_count(
        &self,
        tbl: usize,
        row: usize,
        origin_table: usize,
        origin_col: usize,
    ) -> CoreResult<usize> {
        self.table(tbl)?.backlink_count(row, origin_table, origin_col)
    }

    // ---- integrity ------------------------------------------------------

    /// Checks every structural invariant of the group.
    ///
    /// Verifies column lengths, link ranges, target references, nested
    /// descriptors, and the exact (multiset) agreement of forward links
    /// with backlink bookkeeping.
    pub fn verify(&self) -> CoreResult<()> {
        for (ti, table) in self.tables.iter().enumerate() {
            for (ci, column) in table.columns.iter().enumerate() {
                if column.data.len() != table.size {
                    return Err(CoreError::invalid_operation(format!(
                        "verify: column {ci} of table {ti} has {} cells for {} rows",
                        column.data.len(),
                        table.size
                    )));
                }
                verify_descriptor(ti, ci, &column.desc)?;
                if let Some(lt) = column.desc.link {
                    let target = self.table(lt.table)?;
                    for row in 0..table.size {
                        for v in self.link_cell_values(ti, ci, row) {
                            if v >= target.size {
                                return Err(CoreError::invalid_operation(format!(
                                    "verify: link ({ti}, {ci}, {row}) -> {v} out of range"
                                )));
                            }
                        }
                    }
                    let paired = target
                        .backlinks
                        .iter()
                        .any(|bc| bc.origin_table == ti && bc.origin_col == ci);
                    if !paired {
                        return Err(CoreError::invalid_operation(format!(
                            "verify: link column ({ti}, {ci}) lacks a backlink column"
                        )));
                    }
                }
            }
            for bc in &table.backlinks {
                if bc.rows.len() != table.size {
                    return Err(CoreError::invalid_operation(format!(
                        "verify: backlink column ({}, {}) of table {ti} has {} rows for {}",
                        bc.origin_table,
                        bc.origin_col,
                        bc.rows.len(),
                        table.size
                    )));
                }
                let origin = self.table(bc.origin_table)?;
                let ok = matches!(
                    origin.columns.get(bc.origin_col).and_then(|c| c.desc.link),
                    Some(lt) if lt.table == ti
                );
                if !ok {
                    return Err(CoreError::invalid_operation(format!(
                        "verify: backlink column ({}, {}) of table {ti} has no origin",
                        bc.origin_table, bc.origin_col
                    )));
                }

                // Recompute the expected multiset from the forward links.
                let mut expected: Vec<Vec<usize>> = vec![Vec::new(); table.size];
                for o_row in 0..origin.size {
                    for v in self.link_cell_values(bc.origin_table, bc.origin_col, o_row) {
                        let slot = expected.get_mut(v).ok_or_else(|| {
                            CoreError::invalid_operation(format!(
                                "verify: link ({}, {}, {o_row}) -> {v} out of range",
                                bc.origin_table, bc.origin_col
                            ))
                        })?;
                        slot.push(o_row);
                    }
                }
                for row in 0..table.size {
                    let mut want = expected[row].clone();
                    let mut have = bc.rows[row].clone();
                    want.sort_unstable();
                    have.sort_unstable();
                    if want != have {
                        return Err(CoreError::invalid_operation(format!(
                            "verify: backlinks of ({ti}, {row}) via ({}, {}) disagree: \
                             forward {want:?} vs stored {have:?}",
                            bc.origin_table, bc.origin_col
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks that `path` names a descriptor of the table at `tbl`.
    ///
    /// An empty path (the table root) is always valid for an existing
    /// table.
    pub fn check_descriptor_path(&self, tbl: usize, path: &[usize]) -> CoreResult<()> {
        let table = self.table(tbl)?;
        let Some((first, rest)) = path.split_first() else {
            return Ok(());
        };
        let desc = table.column_descriptor(*first)?;
        if desc.ty != ColumnType::Table {
            return Err(CoreError::invalid_descriptor(format!(
                "column {first} is a {} column, not Table",
                desc.ty
            )));
        }
        descriptor::resolve_path(&desc.nested, rest).map(|_| ())
    }

    // ---- internal helpers ----------------------------------------------

    fn nested_desc_mut(
        &mut self,
        tbl: usize,
        path: &[usize],
    ) -> CoreResult<&mut Vec<ColumnDescriptor>> {
        let (first, rest) = path.split_first().expect("non-empty descriptor path");
        let table = &mut self.tables[tbl];
        let column = table
            .columns
            .get_mut(*first)
            .ok_or(CoreError::NoSuchColumn { col: *first })?;
        if column.desc.ty != ColumnType::Table {
            return Err(CoreError::invalid_descriptor(format!(
                "column {first} is a {} column, not Table",
                column.desc.ty
            )));
        }
        descriptor::resolve_path_mut(&mut column.desc.nested, rest)
    }

    fn link_column(&self, tbl: usize, col: usize, ty: ColumnType) -> CoreResult<LinkTarget> {
        let column = self.tables[tbl].check_col(col)?;
        if column.desc.ty != ty {
            return Err(CoreError::TypeMismatch {
                expected: ty,
                actual: column.desc.ty,
            });
        }
        Ok(column.desc.link.expect("link column without target"))
    }

    /// Reads a link list cell for internal use.
    fn link_list(&self, tbl: usize, col: usize, row: usize) -> CoreResult<&[usize]> {
        self.table(tbl)?.link_list(col, row)
    }

    /// The row references held by one cell (empty for non-link columns).
    pub(crate) fn link_cell_values(&self, tbl: usize, col: usize, row: usize) -> Vec<usize> {
        match &self.tables[tbl].columns[col].data {
            ColumnData::Link(v) => v[row].into_iter().collect(),
            ColumnData::LinkList(v) => v[row].clone(),
            _ => Vec::new(),
        }
    }

    /// Strong references held by (`tbl`, `row`), as cascade seeds.
    /// Self-references are skipped: the row is about to be removed.
    pub(crate) fn collect_strong_seeds_of_row(&self, tbl: usize, row: usize) -> Vec<(usize, usize)> {
        let mut seeds = Vec::new();
        for (c, column) in self.tables[tbl].columns.iter().enumerate() {
            let Some(lt) = column.desc.link else { continue };
            if lt.strength != LinkStrength::Strong {
                continue;
            }
            for v in self.link_cell_values(tbl, c, row) {
                if !(lt.table == tbl && v == row) {
                    seeds.push((lt.table, v));
                }
            }
        }
        seeds
    }

    /// Physically removes (`tbl`, `row`) with move-last-over semantics.
    ///
    /// Breaks incoming references, drops the row's outgoing backlink
    /// entries, swap-removes the storage and rebases every reference to
    /// the moved last row. Does not collect cascade seeds.
    pub(crate) fn erase_row_now(&mut self, tbl: usize, row: usize) {
        let last = self.tables[tbl].size - 1;

        // Break incoming references to the dying row.
        let incoming: Vec<(usize, usize, Vec<usize>)> = self.tables[tbl]
            .backlinks
            .iter()
            .map(|bc| (bc.origin_table, bc.origin_col, bc.rows[row].clone()))
            .collect();
        for (o_tbl, o_col, o_rows) in incoming {
            for o_row in o_rows {
                if o_tbl == tbl && o_row == row {
                    continue; // the dying row's own cell
                }
                self.forward_drop_one(o_tbl, o_col, o_row, row);
            }
        }

        // Drop the dying row's outgoing backlink entries.
        for c in 0..self.tables[tbl].columns.len() {
            let Some(lt) = self.tables[tbl].columns[c].desc.link else {
                continue;
            };
            for v in self.link_cell_values(tbl, c, row) {
                if lt.table == tbl && v == row {
                    continue; // entry lives in the dying backlink cell
                }
                let bc = self.tables[lt.table].backlink_col_mut(tbl, c);
                remove_one(&mut bc.rows[v], row);
            }
        }

        self.tables[tbl].swap_remove_row(row);

        let moved = if row != last {
            self.remap_forward_refs(tbl, last, row);
            self.remap_backlink_origins(tbl, last, row);
            Some(last)
        } else {
            None
        };
        self.notices.push(ChangeNotice::RowRemoved {
            table: tbl,
            row,
            moved_last: moved,
        });
    }

    /// Drops one occurrence of a reference to `target` from the cell at
    /// (`o_tbl`, `o_col`, `o_row`).
    fn forward_drop_one(&mut self, o_tbl: usize, o_col: usize, o_row: usize, target: usize) {
        match &mut self.tables[o_tbl].columns[o_col].data {
            ColumnData::Link(v) => {
                if v[o_row] == Some(target) {
                    v[o_row] = None;
                }
            }
            ColumnData::LinkList(v) => {
                remove_one(&mut v[o_row], target);
            }
            _ => {}
        }
    }

    /// Re-points one occurrence of `from` to `to` in the cell at
    /// (`o_tbl`, `o_col`, `o_row`).
    fn forward_replace_one(&mut self, o_tbl: usize, o_col: usize, o_row: usize, from: usize, to: usize) {
        match &mut self.tables[o_tbl].columns[o_col].data {
            ColumnData::Link(v) => {
                if v[o_row] == Some(from) {
                    v[o_row] = Some(to);
                }
            }
            ColumnData::LinkList(v) => {
                if let Some(p) = v[o_row].iter().position(|&x| x == from) {
                    v[o_row][p] = to;
                }
            }
            _ => {}
        }
    }

    /// Rewrites every forward reference into `target_tbl` equal to `from`
    /// as `to`.
    fn remap_forward_refs(&mut self, target_tbl: usize, from: usize, to: usize) {
        for table in &mut self.tables {
            for column in &mut table.columns {
                if !matches!(column.desc.link, Some(lt) if lt.table == target_tbl) {
                    continue;
                }
                match &mut column.data {
                    ColumnData::Link(v) => {
                        for cell in v.iter_mut() {
                            if *cell == Some(from) {
                                *cell = Some(to);
                            }
                        }
                    }
                    ColumnData::LinkList(v) => {
                        for list in v.iter_mut() {
                            for e in list.iter_mut() {
                                if *e == from {
                                    *e = to;
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Rewrites every backlink entry recording origin row `from` of
    /// `origin_tbl` as `to`.
    fn remap_backlink_origins(&mut self, origin_tbl: usize, from: usize, to: usize) {
        for table in &mut self.tables {
            for bc in &mut table.backlinks {
                if bc.origin_table != origin_tbl {
                    continue;
                }
                for rows in &mut bc.rows {
                    for e in rows.iter_mut() {
                        if *e == from {
                            *e = to;
                        }
                    }
                }
            }
        }
    }

    /// Shifts forward references into `target_tbl` at or above `at` up by
    /// `n` (row insertion).
    fn shift_forward_refs(&mut self, target_tbl: usize, at: usize, n: usize) {
        for table in &mut self.tables {
            for column in &mut table.columns {
                if !matches!(column.desc.link, Some(lt) if lt.table == target_tbl) {
                    continue;
                }
                match &mut column.data {
                    ColumnData::Link(v) => {
                        for cell in v.iter_mut().flatten() {
                            if *cell >= at {
                                *cell += n;
                            }
                        }
                    }
                    ColumnData::LinkList(v) => {
                        for list in v.iter_mut() {
                            for e in list.iter_mut() {
                                if *e >= at {
                                    *e += n;
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Shifts backlink entries recording origin rows of `origin_tbl` at or
    /// above `at` up by `n` (row insertion).
    fn shift_backlink_origins(&mut self, origin_tbl: usize, at: usize, n: usize) {
        for table in &mut self.tables {
            for bc in &mut table.backlinks {
                if bc.origin_table != origin_tbl {
                    continue;
                }
                for rows in &mut bc.rows {
                    for e in rows.iter_mut() {
                        if *e >= at {
                            *e += n;
                        }
                    }
                }
            }
        }
    }

    /// Applies `f` to every stored table index (link targets and backlink
    /// origins).
    fn remap_table_refs(&mut self, f: impl Fn(usize) -> usize) {
        for table in &mut self.tables {
            for column in &mut table.columns {
                if let Some(lt) = &mut column.desc.link {
                    lt.table = f(lt.table);
                }
            }
            for bc in &mut table.backlinks {
                bc.origin_table = f(bc.origin_table);
            }
        }
    }

    /// Shifts origin column indices at or above `col` of backlink columns
    /// keyed to `origin_tbl` by one (column insertion).
    fn shift_origin_cols(&mut self, origin_tbl: usize, col: usize, n: usize) {
        for table in &mut self.tables {
            for bc in &mut table.backlinks {
                if bc.origin_table == origin_tbl && bc.origin_col >= col {
                    bc.origin_col += n;
                }
            }
        }
    }

    /// Shifts origin column indices above `col` down by one (column
    /// erasure).
    fn shift_origin_cols_above(&mut self, origin_tbl: usize, col: usize) {
        for table in &mut self.tables {
            for bc in &mut table.backlinks {
                if bc.origin_table == origin_tbl && bc.origin_col > col {
                    bc.origin_col -= 1;
                }
            }
        }
    }
}

/// Removes one occurrence of `value` from `vec`.
fn remove_one(vec: &mut Vec<usize>, value: usize) {
    if let Some(p) = vec.iter().position(|&x| x == value) {
        vec.remove(p);
    }
}

/// Index remap for a remove-at-`from`, insert-at-`to` reorder.
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

fn verify_descriptor(ti: usize, ci: usize, desc: &ColumnDescriptor) -> CoreResult<()> {
    if desc.ty.is_link_type() != desc.link.is_some() {
        return Err(CoreError::invalid_operation(format!(
            "verify: column ({ti}, {ci}) link target mismatch"
        )));
    }
    for nested in &desc.nested {
        if nested.ty.is_link_type() {
            return Err(CoreError::invalid_operation(format!(
                "verify: nested descriptor under ({ti}, {ci}) holds a link column"
            )));
        }
        verify_descriptor(ti, ci, nested)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_linked_tables(strength: LinkStrength) -> Group {
        let mut g = Group::new();
        let origin = g.add_table("origin").unwrap();
        let target = g.add_table("target").unwrap();
        g.add_column_link(origin, ColumnType::Link, "l", target, strength)
            .unwrap();
        g.add_column(target, ColumnType::Int, "v", false).unwrap();
        g
    }

    #[test]
    fn add_and_find_tables() {
        let mut g = Group::new();
        let a = g.add_table("a").unwrap();
        let b = g.add_table("b").unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(g.table_by_name("b"), Some(1));
        assert!(matches!(
            g.add_table("a"),
            Err(CoreError::DuplicateTableName { .. })
        ));
    }

    #[test]
    fn move_table_remaps_link_targets() {
        let mut g = two_linked_tables(LinkStrength::Weak);
        g.add_empty_row(1, 1).unwrap();
        g.add_empty_row(0, 1).unwrap();
        g.set_link(0, 0, 0, Some(0)).unwrap();

        g.move_table(0, 1).unwrap();
        // origin is now table 1, target table 0
        assert_eq!(g.table(1).unwrap().name(), "origin");
        assert_eq!(g.table(1).unwrap().link_target(0).unwrap().unwrap().table, 0);
        g.verify().unwrap();
    }

    #[test]
    fn set_link_maintains_backlinks() {
        let mut g = two_linked_tables(LinkStrength::Weak);
        g.add_empty_row(1, 2).unwrap();
        g.add_empty_row(0, 2).unwrap();

        g.set_link(0, 0, 0, Some(1)).unwrap();
        g.set_link(0, 0, 1, Some(1)).unwrap();
        assert_eq!(g.backlink_count(1, 1, 0, 0).unwrap(), 2);
        assert_eq!(g.backlink_count(1, 0, 0, 0).unwrap(), 0);

        g.set_link(0, 0, 0, Some(0)).unwrap();
        assert_eq!(g.backlink_count(1, 1, 0, 0).unwrap(), 1);
        assert_eq!(g.backlink_count(1, 0, 0, 0).unwrap(), 1);
        g.verify().unwrap();
    }

    #[test]
    fn weak_target_removal_nullifies_links() {
        let mut g = two_linked_tables(LinkStrength::Weak);
        g.add_empty_row(1, 2).unwrap();
        g.add_empty_row(0, 1).unwrap();
        g.set_link(0, 0, 0, Some(0)).unwrap();

        g.move_last_over(1, 0).unwrap();
        // Former target row 0 is gone; the link must be null. The moved
        // last row keeps its identity at index 0.
        assert_eq!(g.table(0).unwrap().link(0, 0).unwrap(), None);
        assert_eq!(g.table(1).unwrap().size(), 1);
        g.verify().unwrap();
    }

    #[test]
    fn weak_target_removal_rebases_moved_row_links() {
        let mut g = two_linked_tables(LinkStrength::Weak);
        g.add_empty_row(1, 3).unwrap();
        g.add_empty_row(0, 1).unwrap();
        g.set_int(1, 0, 2, 42).unwrap();
        g.set_link(0, 0, 0, Some(2)).unwrap();

        // Removing row 0 moves row 2 into slot 0; the link must follow.
        g.move_last_over(1, 0).unwrap();
        assert_eq!(g.table(0).unwrap().link(0, 0).unwrap(), Some(0));
        assert_eq!(g.table(1).unwrap().int(0, 0).unwrap(), Some(42));
        g.verify().unwrap();
    }

    #[test]
    fn strong_retarget_cascades_old_target() {
        // S3 shape: two strong links, retarget the second onto the first's
        // target; the orphaned row disappears.
        let mut g = two_linked_tables(LinkStrength::Strong);
        g.add_empty_row(1, 2).unwrap();
        g.add_empty_row(0, 2).unwrap();
        g.set_link(0, 0, 0, Some(0)).unwrap();
        g.set_link(0, 0, 1, Some(1)).unwrap();

        g.set_link(0, 0, 1, Some(0)).unwrap();
        assert_eq!(g.table(1).unwrap().size(), 1);
        assert_eq!(g.table(0).unwrap().link(0, 0).unwrap(), Some(0));
        assert_eq!(g.table(0).unwrap().link(0, 1).unwrap(), Some(0));
        g.verify().unwrap();
    }

    #[test]
    fn strong_self_reassign_is_noop() {
        let mut g = two_linked_tables(LinkStrength::Strong);
        g.add_empty_row(1, 2).unwrap();
        g.add_empty_row(0, 2).unwrap();
        g.set_link(0, 0, 0, Some(0)).unwrap();
        g.set_link(0, 0, 1, Some(1)).unwrap();

        g.set_link(0, 0, 1, Some(1)).unwrap();
        assert_eq!(g.table(1).unwrap().size(), 2);
        g.verify().unwrap();
    }

    #[test]
    fn strong_chain_cascades_transitively() {
        let mut g = Group::new();
        let a = g.add_table("a").unwrap();
        let b = g.add_table("b").unwrap();
        let c = g.add_table("c").unwrap();
        g.add_column_link(a, ColumnType::Link, "ab", b, LinkStrength::Strong)
            .unwrap();
        g.add_column_link(b, ColumnType::Link, "bc", c, LinkStrength::Strong)
            .unwrap();
        g.add_column(c, ColumnType::Int, "v", false).unwrap();
        g.add_empty_row(c, 1).unwrap();
        g.add_empty_row(b, 1).unwrap();
        g.add_empty_row(a, 1).unwrap();
        g.set_link(b, 0, 0, Some(0)).unwrap();
        g.set_link(a, 0, 0, Some(0)).unwrap();

        g.move_last_over(a, 0).unwrap();
        assert_eq!(g.table(b).unwrap().size(), 0);
        assert_eq!(g.table(c).unwrap().size(), 0);
        g.verify().unwrap();
    }

    #[test]
    fn strong_cycle_survives_external_break() {
        let mut g = Group::new();
        let t = g.add_table("t").unwrap();
        let ext = g.add_table("ext").unwrap();
        g.add_column_link(t, ColumnType::Link, "self", t, LinkStrength::Strong)
            .unwrap();
        g.add_column_link(ext, ColumnType::Link, "l", t, LinkStrength::Strong)
            .unwrap();
        g.add_empty_row(t, 2).unwrap();
        g.add_empty_row(ext, 1).unwrap();
        // Two-row cycle plus one external strong ref to row 0.
        g.set_link(t, 0, 0, Some(1)).unwrap();
        g.set_link(t, 0, 1, Some(0)).unwrap();
        g.set_link(ext, 0, 0, Some(0)).unwrap();

        // Breaking the external ref must not delete the cycle: each row
        // still holds a strong ref from the other.
        g.nullify_link(ext, 0, 0).unwrap();
        assert_eq!(g.table(t).unwrap().size(), 2);

        // Explicitly removing one member unravels the rest.
        g.move_last_over(t, 0).unwrap();
        assert_eq!(g.table(t).unwrap().size(), 0);
        g.verify().unwrap();
    }

    #[test]
    fn clear_origin_cascades_strong_targets() {
        let mut g = two_linked_tables(LinkStrength::Strong);
        g.add_empty_row(1, 2).unwrap();
        g.add_empty_row(0, 2).unwrap();
        g.set_link(0, 0, 0, Some(0)).unwrap();
        g.set_link(0, 0, 1, Some(1)).unwrap();

        g.clear(0).unwrap();
        assert_eq!(g.table(0).unwrap().size(), 0);
        assert_eq!(g.table(1).unwrap().size(), 0);
        g.verify().unwrap();
    }

    #[test]
    fn clear_weak_target_nullifies_only() {
        let mut g = two_linked_tables(LinkStrength::Weak);
        g.add_empty_row(1, 2).unwrap();
        g.add_empty_row(0, 2).unwrap();
        g.set_link(0, 0, 0, Some(0)).unwrap();
        g.set_link(0, 0, 1, Some(1)).unwrap();

        g.clear(1).unwrap();
        assert_eq!(g.table(0).unwrap().size(), 2);
        assert_eq!(g.table(0).unwrap().link(0, 0).unwrap(), None);
        assert_eq!(g.table(0).unwrap().link(0, 1).unwrap(), None);
        g.verify().unwrap();
    }

    #[test]
    fn link_list_set_same_value_does_not_cascade() {
        // S6 shape.
        let mut g = Group::new();
        let origin = g.add_table("origin").unwrap();
        let target = g.add_table("target").unwrap();
        g.add_column_link(
            origin,
            ColumnType::LinkList,
            "ll",
            target,
            LinkStrength::Strong,
        )
        .unwrap();
        g.add_column(target, ColumnType::Int, "v", false).unwrap();
        g.add_empty_row(target, 2).unwrap();
        g.add_empty_row(origin, 1).unwrap();
        g.link_list_add(origin, 0, 0, 0).unwrap();
        g.link_list_add(origin, 0, 0, 1).unwrap();

        g.link_list_set(origin, 0, 0, 1, 1).unwrap();
        assert_eq!(g.table(target).unwrap().size(), 2);

        g.link_list_set(origin, 0, 0, 1, 0).unwrap();
        assert_eq!(g.table(target).unwrap().size(), 1);
        assert_eq!(g.table(origin).unwrap().link_list(0, 0).unwrap(), &[0, 0]);
        g.verify().unwrap();
    }

    #[test]
    fn link_list_ops_maintain_backlink_multiplicity() {
        let mut g = Group::new();
        let origin = g.add_table("origin").unwrap();
        let target = g.add_table("target").unwrap();
        g.add_column_link(
            origin,
            ColumnType::LinkList,
            "ll",
            target,
            LinkStrength::Weak,
        )
        .unwrap();
        g.add_column(target, ColumnType::Int, "v", false).unwrap();
        g.add_empty_row(target, 2).unwrap();
        g.add_empty_row(origin, 1).unwrap();

        g.link_list_add(origin, 0, 0, 1).unwrap();
        g.link_list_add(origin, 0, 0, 1).unwrap();
        g.link_list_insert(origin, 0, 0, 0, 0).unwrap();
        assert_eq!(g.table(origin).unwrap().link_list(0, 0).unwrap(), &[0, 1, 1]);
        assert_eq!(g.backlink_count(target, 1, origin, 0).unwrap(), 2);

        g.link_list_move(origin, 0, 0, 0, 2).unwrap();
        assert_eq!(g.table(origin).unwrap().link_list(0, 0).unwrap(), &[1, 1, 0]);
        g.link_list_swap(origin, 0, 0, 0, 2).unwrap();
        assert_eq!(g.table(origin).unwrap().link_list(0, 0).unwrap(), &[0, 1, 1]);
        g.link_list_swap(origin, 0, 0, 1, 1).unwrap();

        g.link_list_erase(origin, 0, 0, 1).unwrap();
        assert_eq!(g.backlink_count(target, 1, origin, 0).unwrap(), 1);
        g.link_list_clear(origin, 0, 0).unwrap();
        assert_eq!(g.backlink_count(target, 0, origin, 0).unwrap(), 0);
        g.verify().unwrap();
    }

    #[test]
    fn merge_rows_repoints_then_removes() {
        let mut g = Group::new();
        let t0 = g.add_table("t0").unwrap();
        let t1 = g.add_table("t1").unwrap();
        g.add_column(t0, ColumnType::Int, "i", false).unwrap();
        g.add_column_link(t1, ColumnType::Link, "l", t0, LinkStrength::Weak)
            .unwrap();
        g.add_empty_row(t0, 2).unwrap();
        g.add_empty_row(t1, 2).unwrap();
        g.set_link(t1, 0, 0, Some(0)).unwrap();

        g.merge_rows(t0, 0, 1).unwrap();
        // Row 1 swapped into slot 0 when row 0 was removed; the re-pointed
        // link follows it there.
        assert_eq!(g.table(t0).unwrap().size(), 1);
        assert_eq!(g.table(t1).unwrap().link(0, 0).unwrap(), Some(0));
        g.verify().unwrap();
    }

    #[test]
    fn set_unique_keeps_prior_holder() {
        // S5 shape.
        let mut g = Group::new();
        let t = g.add_table("t").unwrap();
        g.add_column(t, ColumnType::Int, "k", false).unwrap();
        g.add_empty_row(t, 1).unwrap();
        g.set_int(t, 0, 0, 123).unwrap();
        g.add_empty_row(t, 1).unwrap();

        let survivor = g.set_int_unique(t, 0, 1, 123).unwrap();
        assert_eq!(g.table(t).unwrap().size(), 1);
        assert_eq!(survivor, 0);
        assert_eq!(g.table(t).unwrap().int(0, 0).unwrap(), Some(123));
        g.verify().unwrap();
    }

    #[test]
    fn set_null_unique_removes_fresh_row() {
        let mut g = Group::new();
        let t = g.add_table("t").unwrap();
        g.add_column(t, ColumnType::Int, "k", true).unwrap();
        g.add_empty_row(t, 2).unwrap();
        // Both rows default to null; writing null "again" into row 0 must
        // keep row 1 and drop row 0.
        let survivor = g.set_null_unique(t, 0, 0).unwrap();
        assert_eq!(g.table(t).unwrap().size(), 1);
        assert_eq!(survivor, 0);
        g.verify().unwrap();
    }

    #[test]
    fn substring_edits() {
        let mut g = Group::new();
        let t = g.add_table("t").unwrap();
        g.add_column(t, ColumnType::String, "s", false).unwrap();
        g.add_empty_row(t, 1).unwrap();
        g.set_string(t, 0, 0, "Hello, World!").unwrap();

        g.remove_substring(t, 0, 0, 0, 6).unwrap();
        g.insert_substring(t, 0, 0, 0, "Goodbye, Cruel").unwrap();
        assert_eq!(
            g.table(t).unwrap().string(0, 0).unwrap(),
            Some("Goodbye, Cruel World!")
        );

        assert!(matches!(
            g.insert_substring(t, 0, 0, 100, "x"),
            Err(CoreError::SubstringOutOfBounds { .. })
        ));
    }

    #[test]
    fn erase_last_column_empties_table() {
        let mut g = Group::new();
        let t = g.add_table("t").unwrap();
        g.add_column(t, ColumnType::Int, "a", false).unwrap();
        g.add_empty_row(t, 3).unwrap();
        g.erase_column(t, 0).unwrap();
        assert_eq!(g.table(t).unwrap().size(), 0);
        assert_eq!(g.table(t).unwrap().column_count(), 0);
        g.verify().unwrap();
    }

    #[test]
    fn erase_link_column_drops_links_without_cascade() {
        let mut g = two_linked_tables(LinkStrength::Strong);
        g.add_empty_row(1, 2).unwrap();
        g.add_empty_row(0, 2).unwrap();
        g.set_link(0, 0, 0, Some(0)).unwrap();
        g.set_link(0, 0, 1, Some(1)).unwrap();

        g.erase_column(0, 0).unwrap();
        // No cascade: both target rows survive the column removal.
        assert_eq!(g.table(1).unwrap().size(), 2);
        g.verify().unwrap();
    }

    #[test]
    fn erase_referenced_table_fails() {
        let mut g = two_linked_tables(LinkStrength::Weak);
        g.add_empty_row(1, 1).unwrap();
        g.add_empty_row(0, 1).unwrap();
        g.set_link(0, 0, 0, Some(0)).unwrap();

        assert!(matches!(
            g.erase_table(1),
            Err(CoreError::CrossTableLinkTarget)
        ));

        // After the reference is gone the (empty) table is erasable, and
        // the origin's link column goes with it.
        g.nullify_link(0, 0, 0).unwrap();
        g.clear(1).unwrap();
        g.erase_table(1).unwrap();
        assert_eq!(g.table_count(), 1);
        assert_eq!(g.table(0).unwrap().column_count(), 0);
        g.verify().unwrap();
    }

    #[test]
    fn insert_empty_row_shifts_references() {
        let mut g = two_linked_tables(LinkStrength::Weak);
        g.add_empty_row(1, 2).unwrap();
        g.add_empty_row(0, 1).unwrap();
        g.set_int(1, 1, 1, 7).unwrap();
        g.set_link(0, 0, 0, Some(1)).unwrap();

        g.insert_empty_row(1, 0, 2).unwrap();
        assert_eq!(g.table(1).unwrap().size(), 4);
        assert_eq!(g.table(0).unwrap().link(0, 0).unwrap(), Some(3));
        assert_eq!(g.table(1).unwrap().int(1, 3).unwrap(), Some(7));
        g.verify().unwrap();
    }

    #[test]
    fn nested_descriptor_schema_ops() {
        let mut g = Group::new();
        let t = g.add_table("t").unwrap();
        g.add_column(t, ColumnType::Table, "sub", false).unwrap();
        g.insert_column_at(t, &[0], 0, ColumnType::Int, "inner", false, None)
            .unwrap();
        g.insert_column_at(t, &[0], 1, ColumnType::String, "name", true, None)
            .unwrap();
        g.rename_column_at(t, &[0], 0, "renamed").unwrap();
        g.move_column_at(t, &[0], 0, 1).unwrap();

        let table = g.table(t).unwrap();
        let desc = table.column_descriptor(0).unwrap();
        assert_eq!(desc.nested.len(), 2);
        assert_eq!(desc.nested[1].name, "renamed");

        assert!(g
            .insert_column_at(t, &[0], 0, ColumnType::Link, "bad", false, Some((0, LinkStrength::Weak)))
            .is_err());
        g.erase_column_at(t, &[0], 0).unwrap();
        assert_eq!(g.table(t).unwrap().column_descriptor(0).unwrap().nested.len(), 1);
        g.verify().unwrap();
    }
}
