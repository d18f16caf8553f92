//! Tables: ordered columns, a row count and backlink bookkeeping.
//!
//! A table owns its data columns and, separately, one *backlink column*
//! per incoming link column. A backlink column records, for every row of
//! this table, the multiset of origin rows referencing it through one
//! specific (origin table, origin column) pair. Backlinks are maintained
//! eagerly by the group-level mutation API and checked for exact agreement
//! with the forward links by [`crate::Group::verify`].
//!
//! All mutation goes through [`crate::Group`]; this module exposes the
//! read-side accessors.

use crate::column::{Column, ColumnData};
use crate::descriptor::{ColumnDescriptor, LinkTarget};
use crate::error::{CoreError, CoreResult};
use crate::types::{ColumnType, Mixed, Timestamp};

/// Reverse bookkeeping for one incoming link column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BacklinkColumn {
    /// Group-level index of the origin table.
    pub origin_table: usize,
    /// Column index of the link column within the origin table.
    pub origin_col: usize,
    /// Per target row: origin rows referencing it, with multiplicity.
    pub rows: Vec<Vec<usize>>,
}

/// A table of the group.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub(crate) name: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) backlinks: Vec<BacklinkColumn>,
    pub(crate) size: usize,
}

impl Table {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            columns: Vec::new(),
            backlinks: Vec::new(),
            size: 0,
        }
    }

    /// The table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// The descriptor of the column at `col`.
    pub fn column_descriptor(&self, col: usize) -> CoreResult<&ColumnDescriptor> {
        self.columns
            .get(col)
            .map(|c| &c.desc)
            .ok_or(CoreError::NoSuchColumn { col })
    }

    /// The name of the column at `col`.
    pub fn column_name(&self, col: usize) -> CoreResult<&str> {
        Ok(&self.column_descriptor(col)?.name)
    }

    /// The type of the column at `col`.
    pub fn column_type(&self, col: usize) -> CoreResult<ColumnType> {
        Ok(self.column_descriptor(col)?.ty)
    }

    /// The link target of the column at `col`, if it is a link column.
    pub fn link_target(&self, col: usize) -> CoreResult<Option<LinkTarget>> {
        Ok(self.column_descriptor(col)?.link)
    }

    /// Whether the column at `col` carries a search index.
    pub fn has_search_index(&self, col: usize) -> CoreResult<bool> {
        Ok(self.column_descriptor(col)?.indexed)
    }

    /// Finds a column by name.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.desc.name == name)
    }

    /// Returns true if the cell at (`col`, `row`) is null.
    pub fn is_null(&self, col: usize, row: usize) -> CoreResult<bool> {
        self.check_cell(col, row)?;
        Ok(self.columns[col].data.is_null(row))
    }

    /// Reads an integer cell.
    pub fn int(&self, col: usize, row: usize) -> CoreResult<Option<i64>> {
        match &self.cell_data(col, row, ColumnType::Int)? {
            ColumnData::Int(v) => Ok(v[row]),
            _ => unreachable!(),
        }
    }

    /// Reads a boolean cell.
    pub fn bool(&self, col: usize, row: usize) -> CoreResult<Option<bool>> {
        match &self.cell_data(col, row, ColumnType::Bool)? {
            ColumnData::Bool(v) => Ok(v[row]),
            _ => unreachable!(),
        }
    }

    /// Reads a float cell.
    pub fn float(&self, col: usize, row: usize) -> CoreResult<Option<f32>> {
        match &self.cell_data(col, row, ColumnType::Float)? {
            ColumnData::Float(v) => Ok(v[row]),
            _ => unreachable!(),
        }
    }

    /// Reads a double cell.
    pub fn double(&self, col: usize, row: usize) -> CoreResult<Option<f64>> {
        match &self.cell_data(col, row, ColumnType::Double)? {
            ColumnData::Double(v) => Ok(v[row]),
            _ => unreachable!(),
        }
    }

    /// Reads a string cell.
    pub fn string(&self, col: usize, row: usize) -> CoreResult<Option<&str>> {
        match &self.cell_data(col, row, ColumnType::String)? {
            ColumnData::String(v) => Ok(v[row].as_deref()),
            _ => unreachable!(),
        }
    }

    /// Reads a binary cell.
    pub fn binary(&self, col: usize, row: usize) -> CoreResult<Option<&[u8]>> {
        match &self.cell_data(col, row, ColumnType::Binary)? {
            ColumnData::Binary(v) => Ok(v[row].as_deref()),
            _ => unreachable!(),
        }
    }

    /// Reads a legacy datetime cell.
    pub fn old_datetime(&self, col: usize, row: usize) -> CoreResult<Option<i64>> {
        match &self.cell_data(col, row, ColumnType::OldDateTime)? {
            ColumnData::OldDateTime(v) => Ok(v[row]),
            _ => unreachable!(),
        }
    }

    /// Reads a timestamp cell.
    pub fn timestamp(&self, col: usize, row: usize) -> CoreResult<Option<Timestamp>> {
        match &self.cell_data(col, row, ColumnType::Timestamp)? {
            ColumnData::Timestamp(v) => Ok(v[row]),
            _ => unreachable!(),
        }
    }

    /// Reads a mixed cell.
    pub fn mixed(&self, col: usize, row: usize) -> CoreResult<Option<&Mixed>> {
        match &self.cell_data(col, row, ColumnType::Mixed)? {
            ColumnData::Mixed(v) => Ok(v[row].as_ref()),
            _ => unreachable!(),
        }
    }

    /// Reads a link cell. `None` is a null link.
    pub fn link(&self, col: usize, row: usize) -> CoreResult<Option<usize>> {
        match &self.cell_data(col, row, ColumnType::Link)? {
            ColumnData::Link(v) => Ok(v[row]),
            _ => unreachable!(),
        }
    }

    /// Reads a link list cell.
    pub fn link_list(&self, col: usize, row: usize) -> CoreResult<&[usize]> {
        match &self.cell_data(col, row, ColumnType::LinkList)? {
            ColumnData::LinkList(v) => Ok(&v[row]),
            _ => unreachable!(),
        }
    }

    /// Counts backlinks into `row` through the given origin column.
    ///
    /// Link list backlinks are counted with multiplicity.
    pub fn backlink_count(
        &self,
        row: usize,
        origin_table: usize,
        origin_col: usize,
    ) -> CoreResult<usize> {
        self.check_row(row)?;
        let bc = self
            .backlinks
            .iter()
            .find(|b| b.origin_table == origin_table && b.origin_col == origin_col)
            .ok_or(CoreError::NoSuchColumn { col: origin_col })?;
        Ok(bc.rows[row].len())
    }

    // ---- crate-internal helpers -----------------------------------------

    pub(crate) fn check_row(&self, row: usize) -> CoreResult<()> {
        if row >= self.size {
            return Err(CoreError::RowOutOfRange {
                row,
                size: self.size,
            });
        }
        Ok(())
    }

    pub(crate) fn check_col(&self, col: usize) -> CoreResult<&Column> {
        self.columns
            .get(col)
            .ok_or(CoreError::NoSuchColumn { col })
    }

    pub(crate) fn check_cell(&self, col: usize, row: usize) -> CoreResult<()> {
        self.check_col(col)?;
        self.check_row(row)
    }

    fn cell_data(&self, col: usize, row: usize, ty: ColumnType) -> CoreResult<&ColumnData> {
        let column = self.check_col(col)?;
        if column.desc.ty != ty {
            return Err(CoreError::TypeMismatch {
                expected: ty,
                actual: column.desc.ty,
            });
        }
        self.check_row(row)?;
        Ok(&column.data)
    }

    pub(crate) fn typed_col_mut(
        &mut self,
        col: usize,
        ty: ColumnType,
    ) -> CoreResult<&mut Column> {
        let actual = self.check_col(col)?.desc.ty;
        if actual != ty {
            return Err(CoreError::TypeMismatch {
                expected: ty,
                actual,
            });
        }
        Ok(&mut self.columns[col])
    }

    /// The backlink column for (`origin_table`, `origin_col`). Must exist.
    pub(crate) fn backlink_col_mut(
        &mut self,
        origin_table: usize,
        origin_col: usize,
    ) -> &mut BacklinkColumn {
        self.backlinks
            .iter_mut()
            .find(|b| b.origin_table == origin_table && b.origin_col == origin_col)
            .expect("backlink column missing for existing link column")
    }

    /// Appends `n` default rows to every column and backlink column.
    pub(crate) fn append_rows(&mut self, n: usize) {
        for column in &mut self.columns {
            let desc = column.desc.clone();
            column.data.append_default(&desc, n);
        }
        for bc in &mut self.backlinks {
            bc.rows.extend(std::iter::repeat_with(Vec::new).take(n));
        }
        self.size += n;
    }

    /// Inserts `n` default rows at `at` in every column and backlink column.
    pub(crate) fn insert_rows(&mut self, at: usize, n: usize) {
        for column in &mut self.columns {
            let desc = column.desc.clone();
            column.data.insert_default(&desc, at, n);
        }
        for bc in &mut self.backlinks {
            for _ in 0..n {
                bc.rows.insert(at, Vec::new());
            }
        }
        self.size += n;
    }

    /// Swap-removes `row` from every column and backlink column.
    pub(crate) fn swap_remove_row(&mut self, row: usize) {
        for column in &mut self.columns {
            column.data.swap_remove(row);
        }
        for bc in &mut self.backlinks {
            bc.rows.swap_remove(row);
        }
        self.size -= 1;
    }

    /// Drops every row from every column and backlink column.
    pub(crate) fn clear_rows(&mut self) {
        for column in &mut self.columns {
            column.data.clear();
        }
        for bc in &mut self.backlinks {
            bc.rows.clear();
        }
        self.size = 0;
    }
}
