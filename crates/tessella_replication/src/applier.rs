//! The changeset applier.
//!
//! Drives a target group through its mutation API, one parsed instruction
//! at a time and in stream order. Each instruction is fully applied —
//! including the cascade closure the mutation triggers inside the store —
//! before the next begins; change notices are forwarded to the observer
//! at the same granularity. Any error aborts the apply, and the caller
//! (see [`crate::Store::apply_changeset`]) rolls the target back to its
//! pre-transaction state.

use crate::config::{ApplyConfig, ApplyMode, CascadePolicy, UnknownOpcodePolicy};
use crate::error::{ReplError, ReplResult};
use crate::notify::ApplyObserver;
use tessella_codec::{Changeset, Instruction, Parser};
use tessella_core::{CoreResult, Group};

/// Applies changesets to a target group.
pub struct Applier<'a> {
    group: &'a mut Group,
    config: ApplyConfig,
    observer: Option<&'a mut dyn ApplyObserver>,
    selected_table: Option<usize>,
    selected_descriptor: Vec<usize>,
    selected_list: Option<(usize, usize, usize)>,
}

impl<'a> Applier<'a> {
    /// Creates an applier over `group`.
    pub fn new(group: &'a mut Group, config: ApplyConfig) -> Self {
        Self {
            group,
            config,
            observer: None,
            selected_table: None,
            selected_descriptor: Vec::new(),
            selected_list: None,
        }
    }

    /// Attaches a change observer.
    pub fn with_observer(mut self, observer: &'a mut dyn ApplyObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Applies one changeset.
    ///
    /// On error the group may hold a partially applied prefix; the caller
    /// owns the enclosing transaction and must roll back.
    pub fn apply(&mut self, changeset: &Changeset) -> ReplResult<()> {
        if self.config.cascade == CascadePolicy::Disabled && self.group.has_strong_columns() {
            return Err(ReplError::CascadeDisabled);
        }
        tracing::debug!(
            version = changeset.version(),
            bytes = changeset.len(),
            "applying changeset"
        );
        let mut parser = Parser::new(changeset.as_bytes());
        loop {
            let offset = parser.offset();
            let Some(instruction) = parser.next_instruction()? else {
                break;
            };
            self.apply_one(offset, &instruction)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, offset: usize, instruction: &Instruction) -> ReplResult<()> {
        // Stray notices from earlier host activity must not be attributed
        // to this instruction.
        self.group.take_notices();

        match instruction {
            Instruction::Extension { opcode, .. } => {
                return match self.config.treat_unknown_opcode {
                    UnknownOpcodePolicy::Fail => Err(ReplError::UnknownOpcodeRejected {
                        opcode: *opcode,
                        offset,
                    }),
                    UnknownOpcodePolicy::Skip => {
                        tracing::warn!(opcode, offset, "skipping unknown extension record");
                        Ok(())
                    }
                };
            }
            Instruction::SelectTable { table } => {
                self.wrap(offset, instruction, |g| g.table(*table).map(|_| ()))?;
                self.selected_table = Some(*table);
                self.selected_descriptor.clear();
                return Ok(());
            }
            Instruction::SelectDescriptor { path } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.check_descriptor_path(tbl, path))?;
                self.selected_descriptor = path.clone();
                return Ok(());
            }
            Instruction::SelectLinkList { table, col, row } => {
                self.wrap(offset, instruction, |g| {
                    g.table(*table)?.link_list(*col, *row).map(|_| ())
                })?;
                self.selected_list = Some((*table, *col, *row));
                return Ok(());
            }
            _ => {}
        }

        self.dispatch(offset, instruction)?;
        self.forward_notices();
        Ok(())
    }

    fn dispatch(&mut self, offset: usize, instruction: &Instruction) -> ReplResult<()> {
        match instruction {
            Instruction::AddTable { name } => {
                self.wrap(offset, instruction, |g| g.add_table(name).map(|_| ()))
            }
            Instruction::EraseTable { table } => {
                let r = self.wrap(offset, instruction, |g| g.erase_table(*table));
                self.invalidate_tables();
                r
            }
            Instruction::RenameTable { table, name } => {
                self.wrap(offset, instruction, |g| g.rename_table(*table, name))
            }
            Instruction::MoveTable { from, to } => {
                let r = self.wrap(offset, instruction, |g| g.move_table(*from, *to));
                self.invalidate_tables();
                r
            }

            Instruction::InsertColumn {
                col,
                ty,
                name,
                nullable,
                link,
            } => {
                if self.config.cascade == CascadePolicy::Disabled
                    && matches!(link, Some(spec) if spec.strength == tessella_core::LinkStrength::Strong)
                {
                    return Err(ReplError::CascadeDisabled);
                }
                let tbl = self.require_table(offset)?;
                let path = self.selected_descriptor.clone();
                self.wrap(offset, instruction, |g| {
                    g.insert_column_at(
                        tbl,
                        &path,
                        *col,
                        *ty,
                        name,
                        *nullable,
                        link.map(|spec| (spec.target, spec.strength)),
                    )
                })
            }
            Instruction::EraseColumn { col } => {
                let tbl = self.require_table(offset)?;
                let path = self.selected_descriptor.clone();
                self.wrap(offset, instruction, |g| g.erase_column_at(tbl, &path, *col))
            }
            Instruction::RenameColumn { col, name } => {
                let tbl = self.require_table(offset)?;
                let path = self.selected_descriptor.clone();
                self.wrap(offset, instruction, |g| {
                    g.rename_column_at(tbl, &path, *col, name)
                })
            }
            Instruction::MoveColumn { from, to } => {
                let tbl = self.require_table(offset)?;
                let path = self.selected_descriptor.clone();
                self.wrap(offset, instruction, |g| {
                    g.move_column_at(tbl, &path, *from, *to)
                })
            }
            Instruction::AddSearchIndex { col } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.add_search_index(tbl, *col))
            }
            Instruction::RemoveSearchIndex { col } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.remove_search_index(tbl, *col))
            }

            Instruction::InsertEmptyRow { row, count } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.insert_empty_row(tbl, *row, *count)
                })
            }
            Instruction::AddEmptyRow { count } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.add_empty_row(tbl, *count).map(|_| ())
                })
            }
            Instruction::MoveLastOver { row } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.move_last_over(tbl, *row))
            }
            Instruction::ClearTable => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.clear(tbl))
            }
            Instruction::MergeRows { from, to } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.merge_rows(tbl, *from, *to))
            }
            Instruction::AddRowWithKey { col, key } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.add_row_with_key(tbl, *col, *key).map(|_| ())
                })
            }

            Instruction::SetInt { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.set_int(tbl, *col, *row, *value))
            }
            Instruction::SetBool { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.set_bool(tbl, *col, *row, *value))
            }
            Instruction::SetFloat { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.set_float(tbl, *col, *row, *value)
                })
            }
            Instruction::SetDouble { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.set_double(tbl, *col, *row, *value)
                })
            }
            Instruction::SetString { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.set_string(tbl, *col, *row, value))
            }
            Instruction::SetBinary { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.set_binary(tbl, *col, *row, value))
            }
            Instruction::SetTimestamp { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.set_timestamp(tbl, *col, *row, *value)
                })
            }
            Instruction::SetOldDateTime { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.set_old_datetime(tbl, *col, *row, *value)
                })
            }
            Instruction::SetMixed { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.set_mixed(tbl, *col, *row, value.clone())
                })
            }
            Instruction::SetNull { col, row } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.set_null(tbl, *col, *row))
            }
            Instruction::SetIntUnique { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.set_int_unique(tbl, *col, *row, *value).map(|_| ())
                })
            }
            Instruction::SetStringUnique { col, row, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.set_string_unique(tbl, *col, *row, value).map(|_| ())
                })
            }
            Instruction::SetNullUnique { col, row } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.set_null_unique(tbl, *col, *row).map(|_| ())
                })
            }
            Instruction::InsertSubstring { col, row, pos, value } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.insert_substring(tbl, *col, *row, *pos, value)
                })
            }
            Instruction::RemoveSubstring { col, row, pos, len } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.remove_substring(tbl, *col, *row, *pos, *len)
                })
            }

            Instruction::SetLink { col, row, target } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.set_link(tbl, *col, *row, *target))
            }
            Instruction::NullifyLink { col, row } => {
                let tbl = self.require_table(offset)?;
                self.wrap(offset, instruction, |g| g.nullify_link(tbl, *col, *row))
            }

            Instruction::LinkListSet { index, target } => {
                let (t, c, r) = self.require_list(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.link_list_set(t, c, r, *index, *target)
                })
            }
            Instruction::LinkListInsert { index, target } => {
                let (t, c, r) = self.require_list(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.link_list_insert(t, c, r, *index, *target)
                })
            }
            Instruction::LinkListAdd { target } => {
                let (t, c, r) = self.require_list(offset)?;
                self.wrap(offset, instruction, |g| g.link_list_add(t, c, r, *target))
            }
            Instruction::LinkListMove { from, to } => {
                let (t, c, r) = self.require_list(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.link_list_move(t, c, r, *from, *to)
                })
            }
            Instruction::LinkListSwap { a, b } => {
                let (t, c, r) = self.require_list(offset)?;
                self.wrap(offset, instruction, |g| g.link_list_swap(t, c, r, *a, *b))
            }
            Instruction::LinkListErase { index } => {
                let (t, c, r) = self.require_list(offset)?;
                self.wrap(offset, instruction, |g| g.link_list_erase(t, c, r, *index))
            }
            Instruction::LinkListClear => {
                let (t, c, r) = self.require_list(offset)?;
                self.wrap(offset, instruction, |g| g.link_list_clear(t, c, r))
            }
            Instruction::LinkListNullify { index } => {
                let (t, c, r) = self.require_list(offset)?;
                self.wrap(offset, instruction, |g| {
                    g.link_list_nullify(t, c, r, *index)
                })
            }

            Instruction::SelectTable { .. }
            | Instruction::SelectDescriptor { .. }
            | Instruction::SelectLinkList { .. }
            | Instruction::Extension { .. } => unreachable!("handled in apply_one"),
        }
    }

    fn wrap(
        &mut self,
        offset: usize,
        instruction: &Instruction,
        f: impl FnOnce(&mut Group) -> CoreResult<()>,
    ) -> ReplResult<()> {
        f(self.group).map_err(|source| ReplError::Apply {
            offset,
            instruction: instruction.describe(),
            source,
        })
    }

    fn require_table(&self, offset: usize) -> ReplResult<usize> {
        self.selected_table
            .ok_or(ReplError::MissingSelection { offset, what: "table" })
    }

    fn require_list(&self, offset: usize) -> ReplResult<(usize, usize, usize)> {
        self.selected_list.ok_or(ReplError::MissingSelection {
            offset,
            what: "link list",
        })
    }

    fn invalidate_tables(&mut self) {
        self.selected_table = None;
        self.selected_descriptor.clear();
        self.selected_list = None;
    }

    fn forward_notices(&mut self) {
        let notices = self.group.take_notices();
        if self.config.apply_mode == ApplyMode::NonatomicRebuild {
            return;
        }
        if let Some(observer) = self.observer.as_deref_mut() {
            for notice in &notices {
                observer.on_change(notice);
            }
        }
    }
}
