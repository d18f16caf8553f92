//! The cascade engine.
//!
//! Strong ownership: when a strong reference to a row is broken and the
//! row retains no other incoming strong reference, the row is deleted,
//! recursively. Callers snapshot the (table, row) pairs that are about to
//! lose a strong reference, apply their mutation, and hand the pairs to
//! [`Group::run_cascade`].
//!
//! The engine is a fixed-point worklist with a per-candidate recount: a
//! candidate is only deleted once its *current* incoming strong count
//! (self-references excluded) is zero, so cyclic strong graphs are never
//! deleted from the inside — only unraveled once explicitly broken into.
//!
//! Cascade deletions never appear in a recorded changeset. The applier
//! replays the explicit instruction on the target group and this engine
//! re-derives the identical deletions there.

use crate::group::Group;
use crate::types::LinkStrength;

impl Group {
    /// Runs the cascade worklist to its fixed point.
    ///
    /// `work` holds (table, row) pairs that just lost an incoming strong
    /// reference. Deletions are performed in (table index ascending, row
    /// index descending) order, which keeps move-last-over index
    /// arithmetic coherent: within a table the highest pending candidate
    /// is always removed first, so the swapped-in last row can never be
    /// another pending candidate.
    pub(crate) fn run_cascade(&mut self, mut work: Vec<(usize, usize)>) {
        while !work.is_empty() {
            work.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
            work.dedup();
            let (tbl, row) = work.remove(0);

            if self.strong_refs_excluding_self(tbl, row) != 0 {
                continue;
            }

            let mut seeds = self.collect_strong_seeds_of_row(tbl, row);
            let last = self.table(tbl).map(|t| t.size()).unwrap_or(0) - 1;
            self.erase_row_now(tbl, row);

            // Pending entries for the deleted row are moot; entries for
            // the moved last row follow it to its new index.
            work.retain(|&e| e != (tbl, row));
            if row != last {
                for e in work.iter_mut().chain(seeds.iter_mut()) {
                    if e.0 == tbl && e.1 == last {
                        e.1 = row;
                    }
                }
            }
            work.append(&mut seeds);
        }
    }

    /// Counts the incoming strong references of (`tbl`, `row`), excluding
    /// references the row holds to itself.
    fn strong_refs_excluding_self(&self, tbl: usize, row: usize) -> usize {
        let table = match self.table(tbl) {
            Ok(t) => t,
            Err(_) => return 0,
        };
        let mut count = 0;
        for bc in &table.backlinks {
            let origin = match self.table(bc.origin_table) {
                Ok(t) => t,
                Err(_) => continue,
            };
            let strong = matches!(
                origin.link_target(bc.origin_col),
                Ok(Some(lt)) if lt.strength == LinkStrength::Strong
            );
            if !strong {
                continue;
            }
            count += bc.rows[row]
                .iter()
                .filter(|&&o| !(bc.origin_table == tbl && o == row))
                .count();
        }
        count
    }
}
