//! # Tessella Replication
//!
//! Changeset recording, transaction lifecycle and replay for Tessella.
//!
//! This crate provides:
//! - [`Recorder`]: emits the instruction stream from inside a write
//!   transaction, one hook per mutation
//! - [`WriteTransaction`] and [`Store`]: record-then-mutate transactions
//!   with snapshot rollback and consecutive commit versions
//! - [`Applier`] and [`ApplyConfig`]: replay of changesets against a
//!   target store, re-deriving cascade deletions
//! - [`ApplyObserver`] and [`AnchorSet`]: attachment discipline for
//!   accessor handles across applied instructions
//!
//! A changeset applied to an empty store reproduces the source store
//! exactly, including backlink bookkeeping; see the integration tests
//! for the replay laws.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod config;
mod error;
mod notify;
mod recorder;
mod store;
mod transaction;

pub use applier::Applier;
pub use config::{ApplyConfig, ApplyMode, CascadePolicy, UnknownOpcodePolicy};
pub use error::{ReplError, ReplResult};
pub use notify::{AnchorId, AnchorSet, ApplyObserver, ListAnchor, RowAnchor};
pub use recorder::Recorder;
pub use store::Store;
pub use transaction::WriteTransaction;

pub use tessella_codec::Changeset;
