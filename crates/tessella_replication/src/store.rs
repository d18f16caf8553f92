//! The store facade.
//!
//! `Store` owns the group behind a `parking_lot::RwLock`, serializes
//! write transactions, assigns consecutive changeset versions at commit
//! and enforces version monotonicity when replaying changesets from a
//! peer. A failed apply restores the pre-transaction state before
//! returning the error.

use crate::applier::Applier;
use crate::config::ApplyConfig;
use crate::error::{ReplError, ReplResult};
use crate::notify::ApplyObserver;
use crate::transaction::WriteTransaction;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use tessella_codec::Changeset;
use tessella_core::Group;

/// An embeddable store handle.
///
/// # Example
///
/// ```rust,ignore
/// use tessella_replication::{ApplyConfig, Store};
///
/// let source = Store::new();
/// let (_, changeset) = source.transaction(|txn| {
///     let t = txn.add_table("people")?;
///     txn.add_column(t, tessella_core::ColumnType::Int, "age", false)?;
///     txn.add_empty_row(t, 1)?;
///     txn.set_int(t, 0, 0, 42)
/// })?;
///
/// let replica = Store::new();
/// replica.apply_changeset(&changeset, &ApplyConfig::new())?;
/// assert_eq!(*source.read(), *replica.read());
/// ```
#[derive(Debug, Default)]
pub struct Store {
    group: RwLock<Group>,
    version: AtomicU64,
}

impl Store {
    /// Creates an empty store at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The version of the current state: the number of commits or the
    /// version of the last applied changeset, whichever came last.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Takes a shared read snapshot of the group.
    pub fn read(&self) -> RwLockReadGuard<'_, Group> {
        self.group.read()
    }

    /// Begins a write transaction, blocking until exclusive access is
    /// available.
    pub fn write(&self) -> WriteTransaction<'_> {
        WriteTransaction::new(&self.version, self.group.write())
    }

    /// Runs `f` inside a write transaction and commits on success.
    ///
    /// Returns the closure's value together with the commit's changeset.
    /// If `f` fails the transaction is aborted and the state restored.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut WriteTransaction<'_>) -> ReplResult<T>,
    ) -> ReplResult<(T, Changeset)> {
        let mut txn = self.write();
        let value = f(&mut txn)?;
        let changeset = txn.commit()?;
        Ok((value, changeset))
    }

    /// Applies one changeset inside a write transaction.
    ///
    /// The changeset's version must be newer than the store's current
    /// version. On any error the group reverts to its pre-apply state.
    pub fn apply_changeset(&self, changeset: &Changeset, config: &ApplyConfig) -> ReplResult<()> {
        self.apply_inner(changeset, config, None)
    }

    /// Applies one changeset, forwarding change notices to `observer`.
    pub fn apply_changeset_with_observer(
        &self,
        changeset: &Changeset,
        config: &ApplyConfig,
        observer: &mut dyn ApplyObserver,
    ) -> ReplResult<()> {
        self.apply_inner(changeset, config, Some(observer))
    }

    /// Applies a sequence of changesets in order, stopping at the first
    /// error.
    pub fn apply_all<'c>(
        &self,
        changesets: impl IntoIterator<Item = &'c Changeset>,
        config: &ApplyConfig,
    ) -> ReplResult<()> {
        for changeset in changesets {
            self.apply_changeset(changeset, config)?;
        }
        Ok(())
    }

    fn apply_inner(
        &self,
        changeset: &Changeset,
        config: &ApplyConfig,
        observer: Option<&mut dyn ApplyObserver>,
    ) -> ReplResult<()> {
        let current = self.version.load(Ordering::SeqCst);
        if changeset.version() <= current {
            return Err(ReplError::NonMonotonicVersion {
                version: changeset.version(),
                current,
            });
        }

        let mut group = self.group.write();
        let snapshot = group.clone();
        let result = {
            let mut applier = Applier::new(&mut group, *config);
            if let Some(observer) = observer {
                applier = applier.with_observer(observer);
            }
            applier.apply(changeset)
        };
        match result {
            Ok(()) => {
                group.take_notices();
                self.version.store(changeset.version(), Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                *group = snapshot;
                tracing::debug!(error = %e, "apply failed, state restored");
                Err(e)
            }
        }
    }
}
