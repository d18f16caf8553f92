//! Column descriptors.
//!
//! A table's schema is an ordered sequence of [`ColumnDescriptor`]s.
//! `Table`-typed columns carry a nested descriptor sequence of their own,
//! addressed by a *descriptor path*: the column indices of the `Table`
//! columns leading to it, starting at the root of the owning table.

use crate::error::{CoreError, CoreResult};
use crate::types::{ColumnType, LinkStrength};

/// The target of a link column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTarget {
    /// Group-level index of the target table.
    pub table: usize,
    /// Ownership strength of the column.
    pub strength: LinkStrength,
}

/// The schema of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Column name. May be empty.
    pub name: String,
    /// Column type.
    pub ty: ColumnType,
    /// Whether cells of this column admit null.
    pub nullable: bool,
    /// Whether the column carries a search index.
    pub indexed: bool,
    /// Link target, present exactly when `ty` is a link type.
    pub link: Option<LinkTarget>,
    /// Nested descriptors, used only when `ty` is [`ColumnType::Table`].
    pub nested: Vec<ColumnDescriptor>,
}

impl ColumnDescriptor {
    /// Creates a scalar (non-link) descriptor.
    pub fn scalar(name: impl Into<String>, ty: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable,
            indexed: false,
            link: None,
            nested: Vec::new(),
        }
    }

    /// Creates a link descriptor.
    pub fn link(
        name: impl Into<String>,
        ty: ColumnType,
        target: usize,
        strength: LinkStrength,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            indexed: false,
            link: Some(LinkTarget {
                table: target,
                strength,
            }),
            nested: Vec::new(),
        }
    }
}

/// Resolves a descriptor path to the nested descriptor sequence it names.
///
/// An empty path resolves to `root` itself. Each path element must index a
/// `Table` column of the descriptor sequence reached so far.
pub(crate) fn resolve_path_mut<'a>(
    root: &'a mut Vec<ColumnDescriptor>,
    path: &[usize],
) -> CoreResult<&'a mut Vec<ColumnDescriptor>> {
    let mut cols = root;
    for (depth, &idx) in path.iter().enumerate() {
        let len = cols.len();
        let desc = cols.get_mut(idx).ok_or_else(|| {
            CoreError::invalid_descriptor(format!(
                "path element {idx} at depth {depth} out of range ({len} columns)"
            ))
        })?;
        if desc.ty != ColumnType::Table {
            return Err(CoreError::invalid_descriptor(format!(
                "path element {idx} at depth {depth} is a {} column, not Table",
                desc.ty
            )));
        }
        cols = &mut desc.nested;
    }
    Ok(cols)
}

/// Read-only variant of [`resolve_path_mut`].
pub(crate) fn resolve_path<'a>(
    root: &'a [ColumnDescriptor],
    path: &[usize],
) -> CoreResult<&'a [ColumnDescriptor]> {
    let mut cols = root;
    for (depth, &idx) in path.iter().enumerate() {
        let desc = cols.get(idx).ok_or_else(|| {
            CoreError::invalid_descriptor(format!(
                "path element {idx} at depth {depth} out of range ({} columns)",
                cols.len()
            ))
        })?;
        if desc.ty != ColumnType::Table {
            return Err(CoreError::invalid_descriptor(format!(
                "path element {idx} at depth {depth} is a {} column, not Table",
                desc.ty
            )));
        }
        cols = &desc.nested;
    }
    Ok(cols)
}
