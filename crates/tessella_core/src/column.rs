//! Typed column storage.
//!
//! Each column stores one vector of cells, all of the column's declared
//! type. Nullable scalar cells are `Option`s whose default is `None`;
//! non-nullable cells default to zero, false, empty string or empty blob.
//! Link cells are always optional (a null link), link list cells are plain
//! vectors of target row indices, and subtable cells start empty.

use crate::descriptor::ColumnDescriptor;
use crate::types::{ColumnType, Mixed, Timestamp};

/// A subtable cell.
///
/// Subtable cells are created empty and the instruction set defines no
/// subtable data-plane operations, so they stay empty; only the nested
/// descriptor evolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubtableCell;

/// The cells of one column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ColumnData {
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    Float(Vec<Option<f32>>),
    Double(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Binary(Vec<Option<Vec<u8>>>),
    OldDateTime(Vec<Option<i64>>),
    Timestamp(Vec<Option<Timestamp>>),
    Mixed(Vec<Option<Mixed>>),
    Subtable(Vec<SubtableCell>),
    Link(Vec<Option<usize>>),
    LinkList(Vec<Vec<usize>>),
}

/// One column: schema plus storage.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Column {
    pub desc: ColumnDescriptor,
    pub data: ColumnData,
}

impl Column {
    /// Creates a column with `rows` default cells.
    pub fn new(desc: ColumnDescriptor, rows: usize) -> Self {
        let mut data = ColumnData::empty(desc.ty);
        data.append_default(&desc, rows);
        Self { desc, data }
    }
}

macro_rules! scalar_default {
    ($vec:expr, $desc:expr, $n:expr, $zero:expr) => {{
        let fill = if $desc.nullable { None } else { Some($zero) };
        for _ in 0..$n {
            $vec.push(fill.clone());
        }
    }};
}

macro_rules! scalar_insert {
    ($vec:expr, $desc:expr, $at:expr, $n:expr, $zero:expr) => {{
        let fill = if $desc.nullable { None } else { Some($zero) };
        for _ in 0..$n {
            $vec.insert($at, fill.clone());
        }
    }};
}

impl ColumnData {
    /// Creates empty storage of the given type.
    pub fn empty(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Int => Self::Int(Vec::new()),
            ColumnType::Bool => Self::Bool(Vec::new()),
            ColumnType::Float => Self::Float(Vec::new()),
            ColumnType::Double => Self::Double(Vec::new()),
            ColumnType::String => Self::String(Vec::new()),
            ColumnType::Binary => Self::Binary(Vec::new()),
            ColumnType::OldDateTime => Self::OldDateTime(Vec::new()),
            ColumnType::Timestamp => Self::Timestamp(Vec::new()),
            ColumnType::Mixed => Self::Mixed(Vec::new()),
            ColumnType::Table => Self::Subtable(Vec::new()),
            ColumnType::Link => Self::Link(Vec::new()),
            ColumnType::LinkList => Self::LinkList(Vec::new()),
        }
    }

    /// Appends `n` default cells.
    pub fn append_default(&mut self, desc: &ColumnDescriptor, n: usize) {
        match self {
            Self::Int(v) => scalar_default!(v, desc, n, 0),
            Self::Bool(v) => scalar_default!(v, desc, n, false),
            Self::Float(v) => scalar_default!(v, desc, n, 0.0),
            Self::Double(v) => scalar_default!(v, desc, n, 0.0),
            Self::String(v) => scalar_default!(v, desc, n, String::new()),
            Self::Binary(v) => scalar_default!(v, desc, n, Vec::new()),
            Self::OldDateTime(v) => scalar_default!(v, desc, n, 0),
            Self::Timestamp(v) => scalar_default!(v, desc, n, Timestamp::new(0, 0)),
            Self::Mixed(v) => scalar_default!(v, desc, n, Mixed::Int(0)),
            Self::Subtable(v) => v.extend(std::iter::repeat(SubtableCell).take(n)),
            Self::Link(v) => v.extend(std::iter::repeat(None).take(n)),
            Self::LinkList(v) => v.extend(std::iter::repeat_with(Vec::new).take(n)),
        }
    }

    /// Inserts `n` default cells at position `at`.
    pub fn insert_default(&mut self, desc: &ColumnDescriptor, at: usize, n: usize) {
        match self {
            Self::Int(v) => scalar_insert!(v, desc, at, n, 0),
            Self::Bool(v) => scalar_insert!(v, desc, at, n, false),
            Self::Float(v) => scalar_insert!(v, desc, at, n, 0.0),
            Self::Double(v) => scalar_insert!(v, desc, at, n, 0.0),
            Self::String(v) => scalar_insert!(v, desc, at, n, String::new()),
            Self::Binary(v) => scalar_insert!(v, desc, at, n, Vec::new()),
            Self::OldDateTime(v) => scalar_insert!(v, desc, at, n, 0),
            Self::Timestamp(v) => scalar_insert!(v, desc, at, n, Timestamp::new(0, 0)),
            Self::Mixed(v) => scalar_insert!(v, desc, at, n, Mixed::Int(0)),
            Self::Subtable(v) => {
                for _ in 0..n {
                    v.insert(at, SubtableCell);
                }
            }
            Self::Link(v) => {
                for _ in 0..n {
                    v.insert(at, None);
                }
            }
            Self::LinkList(v) => {
                for _ in 0..n {
                    v.insert(at, Vec::new());
                }
            }
        }
    }

    /// Removes the cell at `row` by swapping in the last cell.
    pub fn swap_remove(&mut self, row: usize) {
        match self {
            Self::Int(v) | Self::OldDateTime(v) => {
                v.swap_remove(row);
            }
            Self::Bool(v) => {
                v.swap_remove(row);
            }
            Self::Float(v) => {
                v.swap_remove(row);
            }
            Self::Double(v) => {
                v.swap_remove(row);
            }
            Self::String(v) => {
                v.swap_remove(row);
            }
            Self::Binary(v) => {
                v.swap_remove(row);
            }
            Self::Timestamp(v) => {
                v.swap_remove(row);
            }
            Self::Mixed(v) => {
                v.swap_remove(row);
            }
            Self::Subtable(v) => {
                v.swap_remove(row);
            }
            Self::Link(v) => {
                v.swap_remove(row);
            }
            Self::LinkList(v) => {
                v.swap_remove(row);
            }
        }
    }

    /// Drops every cell.
    pub fn clear(&mut self) {
        match self {
            Self::Int(v) | Self::OldDateTime(v) => v.clear(),
            Self::Bool(v) => v.clear(),
            Self::Float(v) => v.clear(),
            Self::Double(v) => v.clear(),
            Self::String(v) => v.clear(),
            Self::Binary(v) => v.clear(),
            Self::Timestamp(v) => v.clear(),
            Self::Mixed(v) => v.clear(),
            Self::Subtable(v) => v.clear(),
            Self::Link(v) => v.clear(),
            Self::LinkList(v) => v.clear(),
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) | Self::OldDateTime(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Binary(v) => v.len(),
            Self::Timestamp(v) => v.len(),
            Self::Mixed(v) => v.len(),
            Self::Subtable(v) => v.len(),
            Self::Link(v) => v.len(),
            Self::LinkList(v) => v.len(),
        }
    }

    /// Returns true if the cell at `row` is null.
    ///
    /// Subtable and link list cells are never null; a link cell is null
    /// when it holds no target.
    pub fn is_null(&self, row: usize) -> bool {
        match self {
            Self::Int(v) | Self::OldDateTime(v) => v[row].is_none(),
            Self::Bool(v) => v[row].is_none(),
            Self::Float(v) => v[row].is_none(),
            Self::Double(v) => v[row].is_none(),
            Self::String(v) => v[row].is_none(),
            Self::Binary(v) => v[row].is_none(),
            Self::Timestamp(v) => v[row].is_none(),
            Self::Mixed(v) => v[row].is_none(),
            Self::Subtable(_) => false,
            Self::Link(v) => v[row].is_none(),
            Self::LinkList(_) => false,
        }
    }

    /// Sets the cell at `row` to null. The caller has checked nullability.
    pub fn set_null(&mut self, row: usize) {
        match self {
            Self::Int(v) | Self::OldDateTime(v) => v[row] = None,
            Self::Bool(v) => v[row] = None,
            Self::Float(v) => v[row] = None,
            Self::Double(v) => v[row] = None,
            Self::String(v) => v[row] = None,
            Self::Binary(v) => v[row] = None,
            Self::Timestamp(v) => v[row] = None,
            Self::Mixed(v) => v[row] = None,
            Self::Subtable(_) | Self::Link(_) | Self::LinkList(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_defaults_are_null() {
        let desc = ColumnDescriptor::scalar("s", ColumnType::String, true);
        let col = Column::new(desc, 3);
        assert!(col.data.is_null(0));
        assert!(col.data.is_null(2));
    }

    #[test]
    fn non_nullable_defaults_are_zero_values() {
        let desc = ColumnDescriptor::scalar("s", ColumnType::String, false);
        let col = Column::new(desc, 2);
        match &col.data {
            ColumnData::String(v) => assert_eq!(v[0].as_deref(), Some("")),
            _ => unreachable!(),
        }

        let desc = ColumnDescriptor::scalar("i", ColumnType::Int, false);
        let col = Column::new(desc, 2);
        match &col.data {
            ColumnData::Int(v) => assert_eq!(v[1], Some(0)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn insert_shifts_cells() {
        let desc = ColumnDescriptor::scalar("i", ColumnType::Int, false);
        let mut col = Column::new(desc.clone(), 2);
        match &mut col.data {
            ColumnData::Int(v) => {
                v[0] = Some(10);
                v[1] = Some(20);
            }
            _ => unreachable!(),
        }
        col.data.insert_default(&desc, 1, 2);
        match &col.data {
            ColumnData::Int(v) => {
                assert_eq!(v.as_slice(), &[Some(10), Some(0), Some(0), Some(20)]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn swap_remove_moves_last_cell() {
        let desc = ColumnDescriptor::scalar("i", ColumnType::Int, false);
        let mut col = Column::new(desc, 3);
        match &mut col.data {
            ColumnData::Int(v) => {
                v[0] = Some(1);
                v[1] = Some(2);
                v[2] = Some(3);
            }
            _ => unreachable!(),
        }
        col.data.swap_remove(0);
        match &col.data {
            ColumnData::Int(v) => assert_eq!(v.as_slice(), &[Some(3), Some(2)]),
            _ => unreachable!(),
        }
    }
}
