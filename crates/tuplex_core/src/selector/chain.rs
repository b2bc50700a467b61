//! Generic selection chain link.

use super::accessibility::{judge, select_accessible, settle_count, Verdict};
use super::{Count, EntrySelector, SelectionContext};
use crate::entry::Entry;
use crate::error::{CoreError, CoreResult};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::iter;
use tracing::trace;

/// What a coordinator contributes to a selector.
pub(crate) trait SelectionStrategy: Send {
    /// The coordinator's own candidates, in selection order.
    fn candidates(&mut self) -> CoreResult<Vec<Entry>>;

    /// Whether an entry from a predecessor is registered here and fits
    /// the selector's parameters.
    fn admits(&self, entry: &Entry) -> CoreResult<bool>;

    /// Whether [`SelectionStrategy::refine`] reorders its input, so that
    /// admitted entries must be gathered before the first is handed out.
    fn reorders(&self) -> bool {
        false
    }

    /// Final filtering stage over admitted entries.
    fn refine<'s>(
        &'s self,
        admitted: Box<dyn Iterator<Item = Entry> + 's>,
    ) -> Box<dyn Iterator<Item = Entry> + 's> {
        admitted
    }
}

/// A selector link combining a coordinator strategy with an optional predecessor.
pub(crate) struct ChainSelector<S> {
    strategy: S,
    count: Count,
    predecessor: Option<Box<dyn EntrySelector>>,
    /// Candidate cursor of [`EntrySelector::get_next`] when first in chain,
    /// or the refined upstream of a reordering strategy.
    cursor: Option<std::vec::IntoIter<Entry>>,
    /// Buffered predecessor result of [`EntrySelector::get_next`].
    upstream: Option<VecDeque<Entry>>,
}

impl<S: SelectionStrategy> ChainSelector<S> {
    pub(crate) fn new(
        strategy: S,
        count: Count,
        predecessor: Option<Box<dyn EntrySelector>>,
    ) -> Self {
        Self {
            strategy,
            count,
            predecessor,
            cursor: None,
            upstream: None,
        }
    }

    fn narrow_all(
        strategy: &S,
        predecessor: &mut dyn EntrySelector,
        count: Count,
        ctx: &SelectionContext<'_>,
    ) -> CoreResult<Vec<Entry>> {
        let failure: RefCell<Option<CoreError>> = RefCell::new(None);
        let offered = Cell::new(0usize);

        let source: Box<dyn Iterator<Item = Entry> + '_> = if predecessor.count() == Count::Max {
            // Walk the predecessor lazily, pulling only what is needed.
            Box::new(iter::from_fn(|| match predecessor.get_next(ctx) {
                Ok(next) => next,
                Err(e) => {
                    failure.borrow_mut().get_or_insert(e);
                    None
                }
            }))
        } else {
            Box::new(predecessor.get_all(ctx)?.into_iter())
        };

        let admitted = source
            .inspect(|_| offered.set(offered.get() + 1))
            .filter(|entry| match strategy.admits(entry) {
                Ok(admit) => admit,
                Err(e) => {
                    failure.borrow_mut().get_or_insert(e);
                    false
                }
            });
        let refined = strategy.refine(Box::new(admitted));
        let selected: Vec<Entry> = match count {
            Count::Exact(n) => refined.take(n).collect(),
            Count::All | Count::Max => refined.collect(),
        };

        if let Some(e) = failure.into_inner() {
            return Err(e);
        }
        trace!(selected = selected.len(), offered = offered.get(), "narrowed predecessor result");
        settle_count(count, selected, offered.get())
    }

    fn next_upstream(&mut self, ctx: &SelectionContext<'_>) -> CoreResult<Option<Entry>> {
        let Some(predecessor) = self.predecessor.as_mut() else {
            return Ok(None);
        };
        if predecessor.count() == Count::Max {
            return predecessor.get_next(ctx);
        }
        if self.upstream.is_none() {
            self.upstream = Some(predecessor.get_all(ctx)?.into());
        }
        Ok(self.upstream.as_mut().and_then(VecDeque::pop_front))
    }
}

impl<S: SelectionStrategy> EntrySelector for ChainSelector<S> {
    fn count(&self) -> Count {
        self.count
    }

    fn get_all(&mut self, ctx: &SelectionContext<'_>) -> CoreResult<Vec<Entry>> {
        match self.predecessor.as_deref_mut() {
            None => {
                let candidates = self.strategy.candidates()?;
                trace!(candidates = candidates.len(), count = %self.count, "selecting");
                select_accessible(ctx, self.count, candidates)
            }
            Some(predecessor) => Self::narrow_all(&self.strategy, predecessor, self.count, ctx),
        }
    }

    fn get_next(&mut self, ctx: &SelectionContext<'_>) -> CoreResult<Option<Entry>> {
        if self.predecessor.is_none() {
            if self.cursor.is_none() {
                self.cursor = Some(self.strategy.candidates()?.into_iter());
            }
            let Some(cursor) = self.cursor.as_mut() else {
                return Ok(None);
            };
            for entry in cursor.by_ref() {
                if let Verdict::Accept = judge(ctx, &entry)? {
                    return Ok(Some(entry));
                }
            }
            return Ok(None);
        }

        if self.strategy.reorders() {
            if self.cursor.is_none() {
                let mut admitted = Vec::new();
                while let Some(entry) = self.next_upstream(ctx)? {
                    if self.strategy.admits(&entry)? {
                        admitted.push(entry);
                    }
                }
                let refined: Vec<Entry> =
                    self.strategy.refine(Box::new(admitted.into_iter())).collect();
                self.cursor = Some(refined.into_iter());
            }
            return Ok(self.cursor.as_mut().and_then(Iterator::next));
        }

        while let Some(entry) = self.next_upstream(ctx)? {
            if !self.strategy.admits(&entry)? {
                continue;
            }
            if let Some(found) = self.strategy.refine(Box::new(iter::once(entry))).next() {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
