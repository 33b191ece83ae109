// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::DispatcherStats;
use crate::{EndpointId, Readiness, WaitEntry,
            core::endpoint::{AttachedEndpoint, EndpointList}};
use std::{os::fd::AsRawFd, time::Duration};

/// The array handed to [`Multiplexer::wait()`], kept in step with the endpoint list.
///
/// Rebuilt only when its shape no longer matches the list (an endpoint was attached or
/// detached). Otherwise each entry's descriptor, interest and active flag are refreshed
/// in place, so a steady set of endpoints never reallocates.
///
/// [`Multiplexer::wait()`]: crate::Multiplexer::wait
#[derive(Debug, Default)]
pub(crate) struct WaitSet {
    entries: Vec<WaitEntry>,
}

impl WaitSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn entries_mut(&mut self) -> &mut [WaitEntry] { &mut self.entries }

    /// Brings the entries in line with `list`.
    pub fn sync(&mut self, list: &mut EndpointList, stats: &DispatcherStats) {
        if self.needs_rebuild(list) {
            self.entries.clear();
            let entries = &mut self.entries;
            list.for_each_mut(|id, node| {
                node.wait_slot = Some(entries.len());
                let mut entry = WaitEntry::new(id, -1, node.interest);
                refresh(&mut entry, node);
                entries.push(entry);
            });
            stats.record_wait_set_rebuild();
            tracing::trace!(
                message = "wait set rebuilt",
                entries = self.entries.len()
            );
        } else {
            let entries = &mut self.entries;
            list.for_each_mut(|_, node| {
                if let Some(slot) = node.wait_slot {
                    refresh(&mut entries[slot], node);
                }
            });
        }
    }

    fn needs_rebuild(&self, list: &EndpointList) -> bool {
        if self.entries.len() != list.len() {
            return true;
        }
        list.ids().any(|id| {
            let slot = list.get(id).and_then(|node| node.wait_slot);
            !slot.is_some_and(|slot| self.entries.get(slot).is_some_and(|it| it.id == id))
        })
    }

    /// What the last wait reported for `id`. Endpoints that were not in that wait get
    /// an empty readiness.
    pub fn readiness_for(&self, id: EndpointId, slot: Option<usize>) -> Readiness {
        slot.and_then(|slot| self.entries.get(slot))
            .filter(|entry| entry.id == id)
            .map(|entry| entry.readiness)
            .unwrap_or_default()
    }

    pub fn clear_readiness(&mut self) {
        for entry in &mut self.entries {
            entry.readiness = Readiness::default();
        }
    }
}

fn refresh(entry: &mut WaitEntry, node: &AttachedEndpoint) {
    entry.interest = node.interest;
    match &node.handler {
        Some(handler) => {
            entry.fd = handler.source().as_raw_fd();
            entry.active = !node.parked;
        }
        None => entry.active = false,
    }
}

/// The shortest time until any armed deadline in `list` is due.
pub(crate) fn nearest_deadline(list: &EndpointList) -> Option<Duration> {
    list.ids()
        .filter_map(|id| list.get(id).and_then(|node| node.deadline.remaining()))
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Endpoint, EndpointHandler, Interest};
    use pretty_assertions::assert_eq;
    use std::os::{fd::{AsFd, BorrowedFd},
                  unix::net::UnixStream};

    struct Idle(UnixStream);

    impl EndpointHandler for Idle {
        fn source(&self) -> BorrowedFd<'_> { self.0.as_fd() }
    }

    fn idle() -> Endpoint {
        let (it, _) = UnixStream::pair().unwrap();
        Endpoint::new(Idle(it))
    }

    #[test]
    fn test_rebuilds_only_on_shape_change() {
        let stats = DispatcherStats::default();
        let mut list = EndpointList::default();
        let mut wait_set = WaitSet::default();
        let a = list.push_back(idle());
        list.push_back(idle());

        wait_set.sync(&mut list, &stats);
        assert_eq!(stats.snapshot().wait_set_rebuilds, 1);

        // Interest change refreshes in place.
        list.get_mut(a).unwrap().set_interest(Interest::WRITABLE);
        wait_set.sync(&mut list, &stats);
        assert_eq!(stats.snapshot().wait_set_rebuilds, 1);
        assert_eq!(wait_set.entries_mut()[0].interest, Interest::WRITABLE);

        // Detach plus attach keeps the count, but the new endpoint has no slot.
        drop(list.remove(a));
        list.push_back(idle());
        wait_set.sync(&mut list, &stats);
        assert_eq!(stats.snapshot().wait_set_rebuilds, 2);
        assert_eq!(wait_set.entries_mut().len(), 2);
    }

    #[test]
    fn test_parked_entries_are_inactive() {
        let stats = DispatcherStats::default();
        let mut list = EndpointList::default();
        let mut wait_set = WaitSet::default();
        let a = list.push_back(idle());
        list.get_mut(a).unwrap().parked = true;

        wait_set.sync(&mut list, &stats);
        assert!(!wait_set.entries_mut()[0].active);
    }

    #[test]
    fn test_readiness_for_checks_id() {
        let stats = DispatcherStats::default();
        let mut list = EndpointList::default();
        let mut wait_set = WaitSet::default();
        let a = list.push_back(idle());
        wait_set.sync(&mut list, &stats);
        wait_set.entries_mut()[0].readiness.readable = true;

        let slot = list.get(a).unwrap().wait_slot;
        assert!(wait_set.readiness_for(a, slot).readable);

        let stale = EndpointId {
            key: a.key,
            generation: a.generation + 1,
        };
        assert!(wait_set.readiness_for(stale, slot).is_empty());

        wait_set.clear_readiness();
        assert!(wait_set.readiness_for(a, slot).is_empty());
    }

    #[test]
    fn test_nearest_deadline() {
        let mut list = EndpointList::default();
        assert_eq!(nearest_deadline(&list), None);

        list.push_back(idle().with_deadline(Duration::from_secs(60)));
        list.push_back(idle());
        list.push_back(idle().with_deadline(Duration::ZERO));
        assert_eq!(nearest_deadline(&list), Some(Duration::ZERO));
    }
}
