//! # Tessella Core
//!
//! Store data model for Tessella: an embeddable, transactional, columnar
//! object store.
//!
//! This crate provides:
//! - The [`Group`]: an ordered collection of typed tables
//! - Link and link list columns with eager backlink bookkeeping
//! - The cascade engine enforcing strong ownership
//! - [`ChangeNotice`] events for accessor rebasing
//!
//! The on-disk format, the cross-process commit machinery and query
//! evaluation live outside this crate; everything here operates on the
//! in-memory model through the group-level mutation API that the
//! replication layer records and replays.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cascade;
mod column;
mod descriptor;
mod error;
mod group;
mod notice;
mod table;
mod types;

pub use column::SubtableCell;
pub use descriptor::{ColumnDescriptor, LinkTarget};
pub use error::{CoreError, CoreResult};
pub use group::Group;
pub use notice::ChangeNotice;
pub use table::Table;
pub use types::{ColumnType, LinkStrength, Mixed, Timestamp};
