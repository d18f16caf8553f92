//! The changeset instruction set.
//!
//! A changeset is a flat sequence of instructions. Contextual
//! instructions (schema, row, cell and list operations) act on a
//! *selection* established by a preceding `SelectTable`,
//! `SelectDescriptor` or `SelectLinkList`; group-level instructions carry
//! their table index inline.
//!
//! Opcodes `0x01..=0x7f` form the closed core grammar. Opcodes with the
//! high bit set are the extension space: they are encoded as
//! `opcode, length, payload` and can be skipped without understanding
//! them, which is what makes a skip policy for unknown instructions
//! implementable.

use tessella_core::{ColumnType, LinkStrength, Mixed, Timestamp};

/// Opcode bytes of the core grammar.
pub(crate) mod opcode {
    pub const ADD_TABLE: u8 = 0x01;
    pub const ERASE_TABLE: u8 = 0x02;
    pub const RENAME_TABLE: u8 = 0x03;
    pub const MOVE_TABLE: u8 = 0x04;

    pub const SELECT_TABLE: u8 = 0x08;
    pub const SELECT_DESCRIPTOR: u8 = 0x09;
    pub const SELECT_LINK_LIST: u8 = 0x0a;

    pub const INSERT_COLUMN: u8 = 0x10;
    pub const ERASE_COLUMN: u8 = 0x11;
    pub const RENAME_COLUMN: u8 = 0x12;
    pub const MOVE_COLUMN: u8 = 0x13;
    pub const ADD_SEARCH_INDEX: u8 = 0x14;
    pub const REMOVE_SEARCH_INDEX: u8 = 0x15;

    pub const INSERT_EMPTY_ROW: u8 = 0x20;
    pub const ADD_EMPTY_ROW: u8 = 0x21;
    pub const MOVE_LAST_OVER: u8 = 0x22;
    pub const CLEAR_TABLE: u8 = 0x23;
    pub const MERGE_ROWS: u8 = 0x24;
    pub const ADD_ROW_WITH_KEY: u8 = 0x25;

    pub const SET_INT: u8 = 0x30;
    pub const SET_BOOL: u8 = 0x31;
    pub const SET_FLOAT: u8 = 0x32;
    pub const SET_DOUBLE: u8 = 0x33;
    pub const SET_STRING: u8 = 0x34;
    pub const SET_BINARY: u8 = 0x35;
    pub const SET_TIMESTAMP: u8 = 0x36;
    pub const SET_OLD_DATETIME: u8 = 0x37;
    pub const SET_MIXED: u8 = 0x38;
    pub const SET_NULL: u8 = 0x39;
    pub const SET_INT_UNIQUE: u8 = 0x3a;
    pub const SET_STRING_UNIQUE: u8 = 0x3b;
    pub const SET_NULL_UNIQUE: u8 = 0x3c;
    pub const INSERT_SUBSTRING: u8 = 0x3d;
    pub const REMOVE_SUBSTRING: u8 = 0x3e;

    pub const SET_LINK: u8 = 0x40;
    pub const NULLIFY_LINK: u8 = 0x41;

    pub const LINK_LIST_SET: u8 = 0x48;
    pub const LINK_LIST_INSERT: u8 = 0x49;
    pub const LINK_LIST_ADD: u8 = 0x4a;
    pub const LINK_LIST_MOVE: u8 = 0x4b;
    pub const LINK_LIST_SWAP: u8 = 0x4c;
    pub const LINK_LIST_ERASE: u8 = 0x4d;
    pub const LINK_LIST_CLEAR: u8 = 0x4e;
    pub const LINK_LIST_NULLIFY: u8 = 0x4f;

    /// First opcode of the length-prefixed extension space.
    pub const EXTENSION_BASE: u8 = 0x80;
}

/// Link attributes carried by a link-typed `InsertColumn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSpec {
    /// Group-level index of the target table.
    pub target: usize,
    /// Ownership strength of the column.
    pub strength: LinkStrength,
}

/// One decoded changeset instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Appends a table with the given name.
    AddTable {
        /// Name of the new table.
        name: String,
    },
    /// Erases the table at `table`.
    EraseTable {
        /// Group-level table index.
        table: usize,
    },
    /// Renames the table at `table`.
    RenameTable {
        /// Group-level table index.
        table: usize,
        /// The new name.
        name: String,
    },
    /// Moves a table from `from` to `to`.
    MoveTable {
        /// Previous index.
        from: usize,
        /// New index.
        to: usize,
    },

    /// Selects the table subsequent contextual instructions act on.
    /// Resets the descriptor selection to the table root.
    SelectTable {
        /// Group-level table index.
        table: usize,
    },
    /// Selects a nested descriptor of the selected table.
    SelectDescriptor {
        /// Column indices of the `Table` columns leading to the
        /// descriptor, starting at the selected table's root.
        path: Vec<usize>,
    },
    /// Selects the link list subsequent list instructions act on.
    SelectLinkList {
        /// Group-level table index of the origin table.
        table: usize,
        /// Link list column index.
        col: usize,
        /// Origin row index.
        row: usize,
    },

    /// Inserts a column into the selected descriptor.
    InsertColumn {
        /// Insertion position.
        col: usize,
        /// Column type.
        ty: ColumnType,
        /// Column name.
        name: String,
        /// Whether cells admit null.
        nullable: bool,
        /// Link attributes, present iff `ty` is a link type.
        link: Option<LinkSpec>,
    },
    /// Erases a column of the selected descriptor.
    EraseColumn {
        /// Column index.
        col: usize,
    },
    /// Renames a column of the selected descriptor.
    RenameColumn {
        /// Column index.
        col: usize,
        /// The new name.
        name: String,
    },
    /// Moves a column of the selected descriptor.
    MoveColumn {
        /// Previous index.
        from: usize,
        /// New index.
        to: usize,
    },
    /// Adds a search index to a column of the selected table.
    AddSearchIndex {
        /// Column index.
        col: usize,
    },
    /// Removes the search index from a column of the selected table.
    RemoveSearchIndex {
        /// Column index.
        col: usize,
    },

    /// Inserts empty rows into the selected table.
    InsertEmptyRow {
        /// Insertion position.
        row: usize,
        /// Number of rows.
        count: usize,
    },
    /// Appends empty rows to the selected table.
    AddEmptyRow {
        /// Number of rows.
        count: usize,
    },
    /// Removes a row of the selected table with move-last-over semantics.
    MoveLastOver {
        /// Row to remove.
        row: usize,
    },
    /// Removes every row of the selected table.
    ClearTable,
    /// Re-points incoming references and removes `from`.
    MergeRows {
        /// Row whose references are re-pointed and which is removed.
        from: usize,
        /// Row receiving the references.
        to: usize,
    },
    /// Appends a row holding `key` in the integer column `col`.
    AddRowWithKey {
        /// Key column index.
        col: usize,
        /// Key value.
        key: i64,
    },

    /// Sets an integer cell of the selected table.
    SetInt {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: i64,
    },
    /// Sets a boolean cell.
    SetBool {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: bool,
    },
    /// Sets a float cell.
    SetFloat {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: f32,
    },
    /// Sets a double cell.
    SetDouble {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: f64,
    },
    /// Sets a string cell.
    SetString {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: String,
    },
    /// Sets a binary cell.
    SetBinary {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: Vec<u8>,
    },
    /// Sets a timestamp cell.
    SetTimestamp {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: Timestamp,
    },
    /// Sets a legacy datetime cell.
    SetOldDateTime {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: i64,
    },
    /// Sets a mixed cell.
    SetMixed {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// New value.
        value: Mixed,
    },
    /// Sets a nullable scalar cell to null. Never coalesced with writing
    /// zero or an empty value.
    SetNull {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
    },
    /// Sets an integer cell enforcing uniqueness.
    SetIntUnique {
        /// Column index.
        col: usize,
        /// Row index (freshly inserted).
        row: usize,
        /// New value.
        value: i64,
    },
    /// Sets a string cell enforcing uniqueness.
    SetStringUnique {
        /// Column index.
        col: usize,
        /// Row index (freshly inserted).
        row: usize,
        /// New value.
        value: String,
    },
    /// Sets a nullable cell to null enforcing uniqueness of null.
    SetNullUnique {
        /// Column index.
        col: usize,
        /// Row index (freshly inserted).
        row: usize,
    },
    /// Inserts bytes into a string cell.
    InsertSubstring {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// Byte position.
        pos: usize,
        /// Inserted text.
        value: String,
    },
    /// Removes bytes from a string cell.
    RemoveSubstring {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// Byte position.
        pos: usize,
        /// Number of bytes to remove.
        len: usize,
    },

    /// Sets a link cell. `None` is a null link.
    SetLink {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
        /// Target row, or null.
        target: Option<usize>,
    },
    /// Nullifies a link cell.
    NullifyLink {
        /// Column index.
        col: usize,
        /// Row index.
        row: usize,
    },

    /// Overwrites an entry of the selected link list.
    LinkListSet {
        /// List position.
        index: usize,
        /// New target row.
        target: usize,
    },
    /// Inserts an entry into the selected link list.
    LinkListInsert {
        /// List position.
        index: usize,
        /// Target row.
        target: usize,
    },
    /// Appends an entry to the selected link list.
    LinkListAdd {
        /// Target row.
        target: usize,
    },
    /// Moves an entry of the selected link list.
    LinkListMove {
        /// Previous position.
        from: usize,
        /// New position.
        to: usize,
    },
    /// Swaps two entries of the selected link list.
    LinkListSwap {
        /// First position.
        a: usize,
        /// Second position.
        b: usize,
    },
    /// Removes an entry of the selected link list.
    LinkListErase {
        /// List position.
        index: usize,
    },
    /// Removes every entry of the selected link list.
    LinkListClear,
    /// Nullifies an entry of the selected link list.
    LinkListNullify {
        /// List position.
        index: usize,
    },

    /// An extension-space record, carried opaquely.
    Extension {
        /// The extension opcode (`0x80..=0xff`).
        opcode: u8,
        /// The record payload.
        payload: Vec<u8>,
    },
}

impl Instruction {
    /// The instruction's opcode byte.
    pub fn opcode(&self) -> u8 {
        use opcode::*;
        match self {
            Self::AddTable { .. } => ADD_TABLE,
            Self::EraseTable { .. } => ERASE_TABLE,
            Self::RenameTable { .. } => RENAME_TABLE,
            Self::MoveTable { .. } => MOVE_TABLE,
            Self::SelectTable { .. } => SELECT_TABLE,
            Self::SelectDescriptor { .. } => SELECT_DESCRIPTOR,
            Self::SelectLinkList { .. } => SELECT_LINK_LIST,
            Self::InsertColumn { .. } => INSERT_COLUMN,
            Self::EraseColumn { .. } => ERASE_COLUMN,
            Self::RenameColumn { .. } => RENAME_COLUMN,
            Self::MoveColumn { .. } => MOVE_COLUMN,
            Self::AddSearchIndex { .. } => ADD_SEARCH_INDEX,
            Self::RemoveSearchIndex { .. } => REMOVE_SEARCH_INDEX,
            Self::InsertEmptyRow { .. } => INSERT_EMPTY_ROW,
            Self::AddEmptyRow { .. } => ADD_EMPTY_ROW,
            Self::MoveLastOver { .. } => MOVE_LAST_OVER,
            Self::ClearTable => CLEAR_TABLE,
            Self::MergeRows { .. } => MERGE_ROWS,
            Self::AddRowWithKey { .. } => ADD_ROW_WITH_KEY,
            Self::SetInt { .. } => SET_INT,
            Self::SetBool { .. } => SET_BOOL,
            Self::SetFloat { .. } => SET_FLOAT,
            Self::SetDouble { .. } => SET_DOUBLE,
            Self::SetString { .. } => SET_STRING,
            Self::SetBinary { .. } => SET_BINARY,
            Self::SetTimestamp { .. } => SET_TIMESTAMP,
            Self::SetOldDateTime { .. } => SET_OLD_DATETIME,
            Self::SetMixed { .. } => SET_MIXED,
            Self::SetNull { .. } => SET_NULL,
            Self::SetIntUnique { .. } => SET_INT_UNIQUE,
            Self::SetStringUnique { .. } => SET_STRING_UNIQUE,
            Self::SetNullUnique { .. } => SET_NULL_UNIQUE,
            Self::InsertSubstring { .. } => INSERT_SUBSTRING,
            Self::RemoveSubstring { .. } => REMOVE_SUBSTRING,
            Self::SetLink { .. } => SET_LINK,
            Self::NullifyLink { .. } => NULLIFY_LINK,
            Self::LinkListSet { .. } => LINK_LIST_SET,
            Self::LinkListInsert { .. } => LINK_LIST_INSERT,
            Self::LinkListAdd { .. } => LINK_LIST_ADD,
            Self::LinkListMove { .. } => LINK_LIST_MOVE,
            Self::LinkListSwap { .. } => LINK_LIST_SWAP,
            Self::LinkListErase { .. } => LINK_LIST_ERASE,
            Self::LinkListClear => LINK_LIST_CLEAR,
            Self::LinkListNullify { .. } => LINK_LIST_NULLIFY,
            Self::Extension { opcode, .. } => *opcode,
        }
    }

    /// A short human-readable rendering for error reports.
    pub fn describe(&self) -> String {
        match self {
            Self::AddTable { name } => format!("AddTable({name:?})"),
            Self::EraseTable { table } => format!("EraseTable({table})"),
            Self::RenameTable { table, name } => format!("RenameTable({table}, {name:?})"),
            Self::MoveTable { from, to } => format!("MoveTable({from} -> {to})"),
            Self::SelectTable { table } => format!("SelectTable({table})"),
            Self::SelectDescriptor { path } => format!("SelectDescriptor({path:?})"),
            Self::SelectLinkList { table, col, row } => {
                format!("SelectLinkList({table}, {col}, {row})")
            }
            Self::InsertColumn { col, ty, name, .. } => {
                format!("InsertColumn({col}, {ty}, {name:?})")
            }
            Self::EraseColumn { col } => format!("EraseColumn({col})"),
            Self::RenameColumn { col, name } => format!("RenameColumn({col}, {name:?})"),
            Self::MoveColumn { from, to } => format!("MoveColumn({from} -> {to})"),
            Self::AddSearchIndex { col } => format!("AddSearchIndex({col})"),
            Self::RemoveSearchIndex { col } => format!("RemoveSearchIndex({col})"),
            Self::InsertEmptyRow { row, count } => format!("InsertEmptyRow({row}, {count})"),
            Self::AddEmptyRow { count } => format!("AddEmptyRow({count})"),
            Self::MoveLastOver { row } => format!("MoveLastOver({row})"),
            Self::ClearTable => "Clear".into(),
            Self::MergeRows { from, to } => format!("MergeRows({from}, {to})"),
            Self::AddRowWithKey { col, key } => format!("AddRowWithKey({col}, {key})"),
            Self::SetInt { col, row, value } => format!("SetInt({col}, {row}, {value})"),
            Self::SetBool { col, row, value } => format!("SetBool({col}, {row}, {value})"),
            Self::SetFloat { col, row, value } => format!("SetFloat({col}, {row}, {value})"),
            Self::SetDouble { col, row, value } => format!("SetDouble({col}, {row}, {value})"),
            Self::SetString { col, row, value } => format!("SetString({col}, {row}, {value:?})"),
            Self::SetBinary { col, row, value } => {
                format!("SetBinary({col}, {row}, {} bytes)", value.len())
            }
            Self::SetTimestamp { col, row, value } => {
                format!("SetTimestamp({col}, {row}, {value})")
            }
            Self::SetOldDateTime { col, row, value } => {
                format!("SetOldDateTime({col}, {row}, {value})")
            }
            Self::SetMixed { col, row, value } => {
                format!("SetMixed({col}, {row}, {})", value.payload_type())
            }
            Self::SetNull { col, row } => format!("SetNull({col}, {row})"),
            Self::SetIntUnique { col, row, value } => {
                format!("SetIntUnique({col}, {row}, {value})")
            }
            Self::SetStringUnique { col, row, value } => {
                format!("SetStringUnique({col}, {row}, {value:?})")
            }
            Self::SetNullUnique { col, row } => format!("SetNullUnique({col}, {row})"),
            Self::InsertSubstring { col, row, pos, value } => {
                format!("InsertSubstring({col}, {row}, {pos}, {value:?})")
            }
            Self::RemoveSubstring { col, row, pos, len } => {
                format!("RemoveSubstring({col}, {row}, {pos}, {len})")
            }
            Self::SetLink { col, row, target } => match target {
                Some(t) => format!("SetLink({col}, {row}, {t})"),
                None => format!("SetLink({col}, {row}, null)"),
            },
            Self::NullifyLink { col, row } => format!("NullifyLink({col}, {row})"),
            Self::LinkListSet { index, target } => format!("LinkListSet({index}, {target})"),
            Self::LinkListInsert { index, target } => {
                format!("LinkListInsert({index}, {target})")
            }
            Self::LinkListAdd { target } => format!("LinkListAdd({target})"),
            Self::LinkListMove { from, to } => format!("LinkListMove({from} -> {to})"),
            Self::LinkListSwap { a, b } => format!("LinkListSwap({a}, {b})"),
            Self::LinkListErase { index } => format!("LinkListErase({index})"),
            Self::LinkListClear => "LinkListClear".into(),
            Self::LinkListNullify { index } => format!("LinkListNullify({index})"),
            Self::Extension { opcode, payload } => {
                format!("Extension(0x{opcode:02x}, {} bytes)", payload.len())
            }
        }
    }
}
