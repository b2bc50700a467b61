//! Accessibility filtering for the first selector of a chain.

use super::{Count, SelectionContext};
use crate::access::AccessRequest;
use crate::entry::{Entry, EntryId};
use crate::error::{CoreError, CoreResult, CountShortfall};
use crate::isolation::{Availability, Owner};
use tracing::trace;

/// Verdict on a single candidate.
pub(crate) enum Verdict {
    Accept,
    Hidden,
    Locked(Owner),
    Denied,
}

/// Runs the availability check and the access policy on one candidate.
pub(crate) fn judge(ctx: &SelectionContext<'_>, entry: &Entry) -> CoreResult<Verdict> {
    let availability =
        ctx.isolation
            .check_entry_availability(ctx.operation, entry.id(), ctx.level, ctx.stx)?;
    let verdict = match availability {
        Availability::NotVisible => Verdict::Hidden,
        Availability::NotAvailable { holder } => Verdict::Locked(holder),
        Availability::Available => {
            let request = AccessRequest {
                transaction: ctx.stx.transaction(),
                container: ctx.container,
                operation: ctx.operation,
                entry,
            };
            if ctx.access.permits(&request) {
                Verdict::Accept
            } else {
                Verdict::Denied
            }
        }
    };
    Ok(verdict)
}

/// Collects accessible candidates and applies count semantics.
///
/// Hidden candidates never count. The first locked and the first denied
/// candidate are remembered so a mandatory selection can report them.
pub(crate) fn select_accessible<I>(
    ctx: &SelectionContext<'_>,
    count: Count,
    candidates: I,
) -> CoreResult<Vec<Entry>>
where
    I: IntoIterator<Item = Entry>,
{
    let mut selected = Vec::new();
    let mut examined = 0usize;
    let mut locked: Option<(EntryId, Owner)> = None;
    let mut denied: Option<EntryId> = None;

    for entry in candidates {
        if let Count::Exact(n) = count {
            if selected.len() == n {
                break;
            }
        }
        examined += 1;
        match judge(ctx, &entry)? {
            Verdict::Accept => selected.push(entry),
            Verdict::Hidden => trace!(entry = %entry.id(), "candidate not visible"),
            Verdict::Locked(holder) => {
                trace!(entry = %entry.id(), %holder, "candidate locked");
                locked.get_or_insert((entry.id(), holder));
                if count == Count::All {
                    break;
                }
            }
            Verdict::Denied => {
                trace!(entry = %entry.id(), "candidate denied");
                denied.get_or_insert(entry.id());
                if count == Count::All {
                    break;
                }
            }
        }
    }

    match count {
        Count::Max => Ok(selected),
        Count::All => {
            if let Some((entry, holder)) = locked {
                Err(CoreError::EntryLocked { entry, holder })
            } else if let Some(entry) = denied {
                Err(CoreError::AccessDenied { entry })
            } else {
                Ok(selected)
            }
        }
        Count::Exact(n) if selected.len() >= n => Ok(selected),
        Count::Exact(n) => {
            if let Some((entry, holder)) = locked {
                Err(CoreError::EntryLocked { entry, holder })
            } else if let Some(entry) = denied {
                Err(CoreError::AccessDenied { entry })
            } else {
                let shortfall = if examined < n {
                    CountShortfall::Scarcity
                } else {
                    CountShortfall::HardCount
                };
                Err(CoreError::CountNotMet {
                    requested: count,
                    available: selected.len(),
                    shortfall,
                })
            }
        }
    }
}

/// Applies count semantics to entries that already passed accessibility.
///
/// `offered` is how many entries the predecessor produced before filtering.
pub(crate) fn settle_count(
    count: Count,
    selected: Vec<Entry>,
    offered: usize,
) -> CoreResult<Vec<Entry>> {
    match count {
        Count::Exact(n) if selected.len() < n => Err(CoreError::CountNotMet {
            requested: count,
            available: selected.len(),
            shortfall: if offered < n {
                CountShortfall::Scarcity
            } else {
                CountShortfall::HardCount
            },
        }),
        _ => Ok(selected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AllowAll;
    use crate::isolation::{EntryOperation, IsolationManager};
    use crate::types::{ContainerId, IsolationLevel, SubTransactionId, TransactionId};

    const RR: IsolationLevel = IsolationLevel::RepeatableRead;

    fn stx(txn: u64) -> SubTransactionId {
        SubTransactionId::new(TransactionId::new(txn), 1)
    }

    /// Writes `n` committed entries and returns them.
    fn committed(isolation: &IsolationManager, n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| {
                let entry = Entry::new(i as i64);
                isolation
                    .acquire_entry_lock(EntryOperation::Write, entry.id(), RR, stx(100))
                    .unwrap();
                isolation
                    .release_entry_lock(EntryOperation::Write, entry.id(), Owner::Sub(stx(100)))
                    .unwrap();
                entry
            })
            .collect()
    }

    fn ctx<'a>(isolation: &'a IsolationManager, access: &'a AllowAll) -> SelectionContext<'a> {
        SelectionContext {
            isolation,
            access,
            container: ContainerId::new(1),
            operation: EntryOperation::Take,
            level: RR,
            stx: stx(1),
        }
    }

    fn lock_by_other(isolation: &IsolationManager, entry: &Entry) {
        isolation
            .acquire_entry_lock(EntryOperation::Take, entry.id(), RR, stx(2))
            .unwrap();
    }

    #[test]
    fn all_fails_on_single_locked_candidate() {
        let isolation = IsolationManager::new();
        let entries = committed(&isolation, 4);
        lock_by_other(&isolation, &entries[2]);

        let result = select_accessible(&ctx(&isolation, &AllowAll), Count::All, entries.clone());
        match result {
            Err(CoreError::EntryLocked { entry, holder }) => {
                assert_eq!(entry, entries[2].id());
                assert_eq!(holder.transaction(), TransactionId::new(2));
            }
            other => panic!("expected EntryLocked, got {other:?}"),
        }
    }

    #[test]
    fn max_skips_locked_candidates() {
        let isolation = IsolationManager::new();
        let entries = committed(&isolation, 5);
        lock_by_other(&isolation, &entries[0]);
        lock_by_other(&isolation, &entries[3]);

        let selected =
            select_accessible(&ctx(&isolation, &AllowAll), Count::Max, entries).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn exact_reports_lock_when_short() {
        let isolation = IsolationManager::new();
        let entries = committed(&isolation, 2);
        lock_by_other(&isolation, &entries[1]);

        let result = select_accessible(&ctx(&isolation, &AllowAll), Count::Exact(2), entries);
        assert!(matches!(result, Err(CoreError::EntryLocked { .. })));
    }

    #[test]
    fn exact_ignores_lock_when_enough_remain() {
        let isolation = IsolationManager::new();
        let entries = committed(&isolation, 3);
        lock_by_other(&isolation, &entries[0]);

        let selected =
            select_accessible(&ctx(&isolation, &AllowAll), Count::Exact(2), entries).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn exact_distinguishes_scarcity_from_hard_count() {
        let isolation = IsolationManager::new();
        let entries = committed(&isolation, 1);
        let scarce = select_accessible(&ctx(&isolation, &AllowAll), Count::Exact(2), entries);
        assert!(matches!(
            scarce,
            Err(CoreError::CountNotMet {
                shortfall: CountShortfall::Scarcity,
                available: 1,
                ..
            })
        ));

        // Two candidates exist, one of them is gone for everybody.
        let mut entries = committed(&isolation, 1);
        entries.push(Entry::new("never written"));
        let hard = select_accessible(&ctx(&isolation, &AllowAll), Count::Exact(2), entries);
        assert!(matches!(
            hard,
            Err(CoreError::CountNotMet {
                shortfall: CountShortfall::HardCount,
                ..
            })
        ));
    }

    #[test]
    fn denied_candidates_fail_mandatory_selection() {
        let isolation = IsolationManager::new();
        let entries = committed(&isolation, 2);
        let banned = entries[0].id();
        let policy = move |req: &AccessRequest<'_>| req.entry.id() != banned;
        let ctx = SelectionContext {
            access: &policy,
            ..ctx(&isolation, &AllowAll)
        };

        let max = select_accessible(&ctx, Count::Max, entries.clone()).unwrap();
        assert_eq!(max.len(), 1);
        let all = select_accessible(&ctx, Count::All, entries);
        assert!(matches!(all, Err(CoreError::AccessDenied { entry }) if entry == banned));
    }

    #[test]
    fn settle_count_on_filtered_entries() {
        let entries = vec![Entry::new(1)];
        assert!(settle_count(Count::Max, entries.clone(), 4).is_ok());
        assert!(matches!(
            settle_count(Count::Exact(2), entries.clone(), 4),
            Err(CoreError::CountNotMet {
                shortfall: CountShortfall::HardCount,
                ..
            })
        ));
        assert!(matches!(
            settle_count(Count::Exact(2), entries, 1),
            Err(CoreError::CountNotMet {
                shortfall: CountShortfall::Scarcity,
                ..
            })
        ));
    }
}
