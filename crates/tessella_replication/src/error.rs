//! Error types for recording and replay.

use tessella_codec::CodecError;
use tessella_core::CoreError;
use thiserror::Error;

/// Result type for replication operations.
pub type ReplResult<T> = Result<T, ReplError>;

/// Errors that can occur while recording or applying changesets.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReplError {
    /// The changeset could not be parsed.
    #[error("parse error: {0}")]
    Codec(#[from] CodecError),

    /// A store mutation failed outside the apply loop.
    #[error("store error: {0}")]
    Core(#[from] CoreError),

    /// A parsed instruction could not be applied to the target store.
    #[error("failed to apply {instruction} at byte {offset}: {source}")]
    Apply {
        /// Byte offset of the instruction in the changeset.
        offset: usize,
        /// Human-readable rendering of the instruction.
        instruction: String,
        /// The underlying store error.
        source: CoreError,
    },

    /// An extension-space instruction was rejected by policy.
    #[error("unknown opcode 0x{opcode:02x} at byte {offset} rejected by policy")]
    UnknownOpcodeRejected {
        /// The extension opcode.
        opcode: u8,
        /// Byte offset of the instruction.
        offset: usize,
    },

    /// A contextual instruction arrived without its selection.
    #[error("instruction at byte {offset} requires a selected {what}")]
    MissingSelection {
        /// Byte offset of the instruction.
        offset: usize,
        /// What had to be selected ("table" or "link list").
        what: &'static str,
    },

    /// A changeset version did not advance the store's version.
    #[error("changeset version {version} is not newer than current version {current}")]
    NonMonotonicVersion {
        /// The changeset's version.
        version: u64,
        /// The store's current version.
        current: u64,
    },

    /// Cascade was disabled but the schema holds strong columns.
    #[error("cascade disabled but schema contains strong link columns")]
    CascadeDisabled,

    /// A previous operation failed; the transaction must be aborted.
    #[error("write transaction is poisoned by an earlier error")]
    TransactionPoisoned,

    /// The recorder could not reserve buffer space for an instruction.
    ///
    /// Raised before the corresponding mutation runs, so no partial
    /// record is ever left behind.
    #[error("changeset buffer reservation failed for {bytes} additional bytes")]
    AllocationFailure {
        /// The reservation that failed.
        bytes: usize,
    },
}

impl ReplError {
    /// The byte offset associated with the error, if any.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Codec(e) => Some(e.offset()),
            Self::Apply { offset, .. }
            | Self::UnknownOpcodeRejected { offset, .. }
            | Self::MissingSelection { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
