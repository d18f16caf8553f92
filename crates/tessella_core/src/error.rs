//! Error types for the store core.

use crate::types::ColumnType;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while mutating or inspecting a group.
///
/// Variants fall into two classes. *Schema violations* are references to
/// tables, columns or rows that do not exist or have the wrong type for the
/// requested operation. *Invariant violations* are operations that would
/// leave the link graph or the table layout in an inconsistent state.
/// [`CoreError::is_schema_violation`] and
/// [`CoreError::is_invariant_violation`] classify a value accordingly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A table index was out of range.
    #[error("no such table: index {table}")]
    NoSuchTable {
        /// The offending table index.
        table: usize,
    },

    /// A column index was out of range for its table.
    #[error("no such column: index {col}")]
    NoSuchColumn {
        /// The offending column index.
        col: usize,
    },

    /// A row index was out of range for its table.
    #[error("row index {row} out of range: table has {size} rows")]
    RowOutOfRange {
        /// The offending row index.
        row: usize,
        /// The table's current row count.
        size: usize,
    },

    /// A link list index was out of range.
    #[error("link list index {index} out of range: list has {len} entries")]
    ListIndexOutOfRange {
        /// The offending list position.
        index: usize,
        /// The list's current length.
        len: usize,
    },

    /// A cell operation was applied to a column of the wrong type.
    #[error("column type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The type the operation requires.
        expected: ColumnType,
        /// The column's actual type.
        actual: ColumnType,
    },

    /// A null was written to a column that does not admit nulls.
    #[error("column {col} is not nullable")]
    NotNullable {
        /// The non-nullable column.
        col: usize,
    },

    /// A table name is already in use within the group.
    #[error("duplicate table name: {name:?}")]
    DuplicateTableName {
        /// The conflicting name.
        name: String,
    },

    /// A link was set to a row that does not exist in the target table.
    #[error("link target row {target} out of range: target table has {size} rows")]
    LinkTargetOutOfRange {
        /// The offending target row.
        target: usize,
        /// The target table's current row count.
        size: usize,
    },

    /// A table that other tables still reference by row cannot be removed.
    #[error("table is the target of existing links and cannot be removed")]
    CrossTableLinkTarget,

    /// A substring edit addressed a position outside the string.
    #[error("substring position {pos} out of bounds for string of length {len}")]
    SubstringOutOfBounds {
        /// The offending byte position.
        pos: usize,
        /// The string's byte length.
        len: usize,
    },

    /// A descriptor path did not resolve to a nested table descriptor.
    #[error("invalid descriptor path: {message}")]
    InvalidDescriptor {
        /// Description of the path problem.
        message: String,
    },

    /// Catch-all for operations that are invalid in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid descriptor error.
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if this error is a reference to a missing or wrongly
    /// typed table, column or row.
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            Self::NoSuchTable { .. }
                | Self::NoSuchColumn { .. }
                | Self::RowOutOfRange { .. }
                | Self::ListIndexOutOfRange { .. }
                | Self::TypeMismatch { .. }
                | Self::NotNullable { .. }
                | Self::DuplicateTableName { .. }
                | Self::LinkTargetOutOfRange { .. }
        )
    }

    /// Returns true if this error signals an operation that would break a
    /// structural invariant of the group.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::CrossTableLinkTarget
                | Self::SubstringOutOfBounds { .. }
                | Self::InvalidDescriptor { .. }
                | Self::InvalidOperation { .. }
        )
    }
}
