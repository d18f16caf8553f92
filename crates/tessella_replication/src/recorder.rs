//! The changeset recorder.
//!
//! A recorder is bound 1:1 to a write transaction. Every mutating
//! operation calls its hook *before* the mutation takes effect in memory;
//! the hook appends exactly one instruction (plus any selection
//! instruction the context change requires) and reserves the buffer space
//! first, so an allocation failure aborts the mutation without leaving a
//! partial record. Previously recorded instructions are never rolled
//! back; an aborted transaction discards the whole buffer.
//!
//! Cascade deletions and any writes performed by the cascade engine are
//! not hooks and therefore never appear in the stream; the applier
//! re-derives them on the target store.
//!
//! The recorder keeps a cached selection (table, descriptor, link list)
//! and re-emits a Select instruction whenever the context changes. The
//! link-list cache is conservatively dropped after any hook whose
//! mutation can move rows — explicitly or through cascade, which may
//! reach any table — so the next list instruction always re-selects with
//! fresh indices.

use crate::error::{ReplError, ReplResult};
use tessella_codec::{Changeset, Instruction, InstructionEncoder, LinkSpec};
use tessella_core::{ColumnType, LinkStrength, Mixed, Timestamp};

/// Records the instruction stream of one write transaction.
#[derive(Debug, Default)]
pub struct Recorder {
    buffer: Vec<u8>,
    scratch: InstructionEncoder,
    selected_table: Option<usize>,
    selected_descriptor: Vec<usize>,
    selected_list: Option<(usize, usize, usize)>,
}

impl Recorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Freezes the buffer into the changeset of commit `version`.
    pub fn freeze(self, version: u64) -> Changeset {
        Changeset::new(version, self.buffer)
    }

    // ---- group-level hooks ----------------------------------------------

    pub(crate) fn add_table(&mut self, name: &str) -> ReplResult<()> {
        self.emit(&Instruction::AddTable { name: name.into() })
    }

    pub(crate) fn erase_table(&mut self, table: usize) -> ReplResult<()> {
        self.emit(&Instruction::EraseTable { table })?;
        self.invalidate_tables();
        Ok(())
    }

    pub(crate) fn rename_table(&mut self, table: usize, name: &str) -> ReplResult<()> {
        self.emit(&Instruction::RenameTable {
            table,
            name: name.into(),
        })
    }

    pub(crate) fn move_table(&mut self, from: usize, to: usize) -> ReplResult<()> {
        self.emit(&Instruction::MoveTable { from, to })?;
        self.invalidate_tables();
        Ok(())
    }

    // ---- schema hooks ----------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_column(
        &mut self,
        tbl: usize,
        path: &[usize],
        col: usize,
        ty: ColumnType,
        name: &str,
        nullable: bool,
        link: Option<(usize, LinkStrength)>,
    ) -> ReplResult<()> {
        self.ensure_descriptor(tbl, path)?;
        self.emit(&Instruction::InsertColumn {
            col,
            ty,
            name: name.into(),
            nullable,
            link: link.map(|(target, strength)| LinkSpec { target, strength }),
        })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn erase_column(&mut self, tbl: usize, path: &[usize], col: usize) -> ReplResult<()> {
        self.ensure_descriptor(tbl, path)?;
        self.emit(&Instruction::EraseColumn { col })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn rename_column(
        &mut self,
        tbl: usize,
        path: &[usize],
        col: usize,
        name: &str,
    ) -> ReplResult<()> {
        self.ensure_descriptor(tbl, path)?;
        self.emit(&Instruction::RenameColumn {
            col,
            name: name.into(),
        })
    }

    pub(crate) fn move_column(
        &mut self,
        tbl: usize,
        path: &[usize],
        from: usize,
        to: usize,
    ) -> ReplResult<()> {
        self.ensure_descriptor(tbl, path)?;
        self.emit(&Instruction::MoveColumn { from, to })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn add_search_index(&mut self, tbl: usize, col: usize) -> ReplResult<()> {
        self.ensure_descriptor(tbl, &[])?;
        self.emit(&Instruction::AddSearchIndex { col })
    }

    pub(crate) fn remove_search_index(&mut self, tbl: usize, col: usize) -> ReplResult<()> {
        self.ensure_descriptor(tbl, &[])?;
        self.emit(&Instruction::RemoveSearchIndex { col })
    }

    // ---- row hooks -------------------------------------------------------

    pub(crate) fn insert_empty_row(&mut self, tbl: usize, row: usize, count: usize) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::InsertEmptyRow { row, count })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn add_empty_row(&mut self, tbl: usize, count: usize) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::AddEmptyRow { count })
    }

    pub(crate) fn move_last_over(&mut self, tbl: usize, row: usize) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::MoveLastOver { row })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn clear(&mut self, tbl: usize) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::ClearTable)?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn merge_rows(&mut self, tbl: usize, from: usize, to: usize) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::MergeRows { from, to })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn add_row_with_key(&mut self, tbl: usize, col: usize, key: i64) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::AddRowWithKey { col, key })?;
        self.selected_list = None;
        Ok(())
    }

    // ---- cell hooks ------------------------------------------------------

    pub(crate) fn set_int(&mut self, tbl: usize, col: usize, row: usize, value: i64) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetInt { col, row, value })
    }

    pub(crate) fn set_bool(&mut self, tbl: usize, col: usize, row: usize, value: bool) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetBool { col, row, value })
    }

    pub(crate) fn set_float(&mut self, tbl: usize, col: usize, row: usize, value: f32) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetFloat { col, row, value })
    }

    pub(crate) fn set_double(&mut self, tbl: usize, col: usize, row: usize, value: f64) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetDouble { col, row, value })
    }

    pub(crate) fn set_string(&mut self, tbl: usize, col: usize, row: usize, value: &str) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetString {
            col,
            row,
            value: value.into(),
        })
    }

    pub(crate) fn set_binary(&mut self, tbl: usize, col: usize, row: usize, value: &[u8]) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetBinary {
            col,
            row,
            value: value.into(),
        })
    }

    pub(crate) fn set_timestamp(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: Timestamp,
    ) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetTimestamp { col, row, value })
    }

    pub(crate) fn set_old_datetime(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: i64,
    ) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetOldDateTime { col, row, value })
    }

    pub(crate) fn set_mixed(&mut self, tbl: usize, col: usize, row: usize, value: &Mixed) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetMixed {
            col,
            row,
            value: value.clone(),
        })
    }

    pub(crate) fn set_null(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetNull { col, row })
    }

    pub(crate) fn set_int_unique(&mut self, tbl: usize, col: usize, row: usize, value: i64) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetIntUnique { col, row, value })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn set_string_unique(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        value: &str,
    ) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetStringUnique {
            col,
            row,
            value: value.into(),
        })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn set_null_unique(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetNullUnique { col, row })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn insert_substring(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        pos: usize,
        value: &str,
    ) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::InsertSubstring {
            col,
            row,
            pos,
            value: value.into(),
        })
    }

    pub(crate) fn remove_substring(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        pos: usize,
        len: usize,
    ) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::RemoveSubstring { col, row, pos, len })
    }

    // ---- link hooks ------------------------------------------------------

    pub(crate) fn set_link(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        target: Option<usize>,
    ) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::SetLink { col, row, target })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn nullify_link(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        self.emit(&Instruction::NullifyLink { col, row })?;
        self.selected_list = None;
        Ok(())
    }

    // ---- link list hooks -------------------------------------------------

    pub(crate) fn link_list_set(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        index: usize,
        target: usize,
    ) -> ReplResult<()> {
        self.ensure_list(tbl, col, row)?;
        self.emit(&Instruction::LinkListSet { index, target })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn link_list_insert(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        index: usize,
        target: usize,
    ) -> ReplResult<()> {
        self.ensure_list(tbl, col, row)?;
        self.emit(&Instruction::LinkListInsert { index, target })
    }

    pub(crate) fn link_list_add(&mut self, tbl: usize, col: usize, row: usize, target: usize) -> ReplResult<()> {
        self.ensure_list(tbl, col, row)?;
        self.emit(&Instruction::LinkListAdd { target })
    }

    pub(crate) fn link_list_move(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        from: usize,
        to: usize,
    ) -> ReplResult<()> {
        self.ensure_list(tbl, col, row)?;
        self.emit(&Instruction::LinkListMove { from, to })
    }

    pub(crate) fn link_list_swap(
        &mut self,
        tbl: usize,
        col: usize,
        row: usize,
        a: usize,
        b: usize,
    ) -> ReplResult<()> {
        self.ensure_list(tbl, col, row)?;
        self.emit(&Instruction::LinkListSwap { a, b })
    }

    pub(crate) fn link_list_erase(&mut self, tbl: usize, col: usize, row: usize, index: usize) -> ReplResult<()> {
        self.ensure_list(tbl, col, row)?;
        self.emit(&Instruction::LinkListErase { index })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn link_list_nullify(&mut self, tbl: usize, col: usize, row: usize, index: usize) -> ReplResult<()> {
        self.ensure_list(tbl, col, row)?;
        self.emit(&Instruction::LinkListNullify { index })?;
        self.selected_list = None;
        Ok(())
    }

    pub(crate) fn link_list_clear(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<()> {
        self.ensure_list(tbl, col, row)?;
        self.emit(&Instruction::LinkListClear)?;
        self.selected_list = None;
        Ok(())
    }

    // ---- selection and emission -----------------------------------------

    fn ensure_table(&mut self, tbl: usize) -> ReplResult<()> {
        if self.selected_table != Some(tbl) {
            self.emit(&Instruction::SelectTable { table: tbl })?;
            self.selected_table = Some(tbl);
            self.selected_descriptor.clear();
        }
        Ok(())
    }

    fn ensure_descriptor(&mut self, tbl: usize, path: &[usize]) -> ReplResult<()> {
        self.ensure_table(tbl)?;
        if self.selected_descriptor != path {
            self.emit(&Instruction::SelectDescriptor { path: path.to_vec() })?;
            self.selected_descriptor = path.to_vec();
        }
        Ok(())
    }

    fn ensure_list(&mut self, tbl: usize, col: usize, row: usize) -> ReplResult<()> {
        if self.selected_list != Some((tbl, col, row)) {
            self.emit(&Instruction::SelectLinkList {
                table: tbl,
                col,
                row,
            })?;
            self.selected_list = Some((tbl, col, row));
        }
        Ok(())
    }

    fn invalidate_tables(&mut self) {
        self.selected_table = None;
        self.selected_descriptor.clear();
        self.selected_list = None;
    }

    /// Stages the instruction, reserves buffer space and appends it.
    ///
    /// The reservation happens before the caller performs the mutation,
    /// so reservation failure leaves both the buffer and the store
    /// untouched by this operation.
    fn emit(&mut self, instruction: &Instruction) -> ReplResult<()> {
        self.scratch.clear();
        self.scratch.encode(instruction);
        let bytes = self.scratch.as_bytes();
        self.buffer
            .try_reserve(bytes.len())
            .map_err(|_| ReplError::AllocationFailure { bytes: bytes.len() })?;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessella_codec::Parser;

    fn parse_all(bytes: &[u8]) -> Vec<Instruction> {
        let mut parser = Parser::new(bytes);
        let mut out = Vec::new();
        while let Some(i) = parser.next_instruction().unwrap() {
            out.push(i);
        }
        out
    }

    #[test]
    fn select_table_emitted_once_per_context() {
        let mut rec = Recorder::new();
        rec.add_table("t").unwrap();
        rec.set_int(0, 0, 0, 1).unwrap();
        rec.set_int(0, 0, 1, 2).unwrap();
        let cs = rec.freeze(1);
        let instructions = parse_all(cs.as_bytes());
        let selects = instructions
            .iter()
            .filter(|i| matches!(i, Instruction::SelectTable { .. }))
            .count();
        assert_eq!(selects, 1);
    }

    #[test]
    fn table_switch_reselects() {
        let mut rec = Recorder::new();
        rec.set_int(0, 0, 0, 1).unwrap();
        rec.set_int(1, 0, 0, 2).unwrap();
        rec.set_int(0, 0, 1, 3).unwrap();
        let cs = rec.freeze(1);
        let selects: Vec<usize> = parse_all(cs.as_bytes())
            .iter()
            .filter_map(|i| match i {
                Instruction::SelectTable { table } => Some(*table),
                _ => None,
            })
            .collect();
        assert_eq!(selects, vec![0, 1, 0]);
    }

    #[test]
    fn row_motion_forces_list_reselect() {
        let mut rec = Recorder::new();
        rec.link_list_add(0, 0, 1, 0).unwrap();
        rec.move_last_over(0, 0).unwrap();
        // The list moved to row 0; the recorder must select it anew.
        rec.link_list_add(0, 0, 0, 1).unwrap();
        let cs = rec.freeze(1);
        let selects: Vec<(usize, usize, usize)> = parse_all(cs.as_bytes())
            .iter()
            .filter_map(|i| match i {
                Instruction::SelectLinkList { table, col, row } => Some((*table, *col, *row)),
                _ => None,
            })
            .collect();
        assert_eq!(selects, vec![(0, 0, 1), (0, 0, 0)]);
    }

    #[test]
    fn consecutive_list_ops_share_selection() {
        let mut rec = Recorder::new();
        rec.link_list_add(0, 0, 0, 0).unwrap();
        rec.link_list_add(0, 0, 0, 1).unwrap();
        rec.link_list_move(0, 0, 0, 0, 1).unwrap();
        let cs = rec.freeze(1);
        let selects = parse_all(cs.as_bytes())
            .iter()
            .filter(|i| matches!(i, Instruction::SelectLinkList { .. }))
            .count();
        assert_eq!(selects, 1);
    }

    #[test]
    fn empty_recorder_freezes_to_zero_op() {
        let rec = Recorder::new();
        let cs = rec.freeze(7);
        assert!(cs.is_empty());
        assert_eq!(cs.version(), 7);
    }
}
