// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The dispatcher-owned list of attached endpoints.
//!
//! Nodes live in a [`Slab`] arena and are threaded into a doubly linked list through
//! their arena keys, so attach order is preserved while insert and remove stay O(1).
//! Outside code never sees a node; it holds an [`EndpointId`] whose generation is
//! checked on every lookup.

use super::{Endpoint, EndpointHandler, EndpointId, Interest};
use crate::Deadline;
use slab::Slab;
use std::sync::{Arc,
                atomic::{AtomicUsize, Ordering}};

/// An endpoint while it is linked into a dispatcher.
///
/// `handler` is [`None`] only while one of its callbacks is running (the dispatcher
/// moves it out of the node for the duration of the call).
pub(crate) struct AttachedEndpoint {
    pub handler: Option<Box<dyn EndpointHandler>>,
    pub interest: Interest,
    pub deadline: Deadline,
    /// Index into the wait set built for the last multiplexer wait.
    pub wait_slot: Option<usize>,
    /// Excluded from the wait set: a disconnect was reported that no callback handles.
    /// Cleared when the interest changes.
    pub parked: bool,
}

impl AttachedEndpoint {
    fn new(endpoint: Endpoint) -> Self {
        let Endpoint {
            handler,
            interest,
            deadline,
        } = endpoint;
        Self {
            handler: Some(handler),
            interest,
            deadline,
            wait_slot: None,
            parked: false,
        }
    }

    /// Converts back to the unattached form. [`None`] if the handler is currently out
    /// on a callback.
    pub fn into_endpoint(self) -> Option<Endpoint> {
        let Self {
            handler,
            interest,
            deadline,
            ..
        } = self;
        handler.map(|handler| Endpoint {
            handler,
            interest,
            deadline,
        })
    }

    pub fn set_interest(&mut self, interest: Interest) {
        if self.interest != interest {
            self.parked = false;
        }
        self.interest = interest;
    }
}

struct Node {
    generation: u64,
    prev: Option<usize>,
    next: Option<usize>,
    endpoint: AttachedEndpoint,
}

pub(crate) struct EndpointList {
    nodes: Slab<Node>,
    head: Option<usize>,
    tail: Option<usize>,
    next_generation: u64,
    /// Copy of `len()` readable without the registry lock.
    len_mirror: Arc<AtomicUsize>,
}

impl Default for EndpointList {
    fn default() -> Self { Self::with_capacity(0) }
}

impl EndpointList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            head: None,
            tail: None,
            next_generation: 1,
            len_mirror: Arc::default(),
        }
    }

    pub fn len_mirror(&self) -> Arc<AtomicUsize> { self.len_mirror.clone() }

    fn publish_len(&self) { self.len_mirror.store(self.nodes.len(), Ordering::SeqCst); }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Links `endpoint` at the tail.
    pub fn push_back(&mut self, endpoint: Endpoint) -> EndpointId {
        let generation = self.next_generation;
        self.next_generation += 1;

        let prev = self.tail;
        let key = self.nodes.insert(Node {
            generation,
            prev,
            next: None,
            endpoint: AttachedEndpoint::new(endpoint),
        });

        match prev {
            Some(prev) => self.nodes[prev].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.publish_len();

        EndpointId { key, generation }
    }

    /// Unlinks the endpoint, fixing up head and tail. [`None`] for a stale id.
    pub fn remove(&mut self, id: EndpointId) -> Option<AttachedEndpoint> {
        if !self.contains(id) {
            return None;
        }
        let node = self.nodes.remove(id.key);

        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        self.publish_len();

        Some(node.endpoint)
    }

    pub fn contains(&self, id: EndpointId) -> bool {
        self.nodes
            .get(id.key)
            .is_some_and(|node| node.generation == id.generation)
    }

    pub fn get(&self, id: EndpointId) -> Option<&AttachedEndpoint> {
        self.nodes
            .get(id.key)
            .filter(|node| node.generation == id.generation)
            .map(|node| &node.endpoint)
    }

    pub fn get_mut(&mut self, id: EndpointId) -> Option<&mut AttachedEndpoint> {
        self.nodes
            .get_mut(id.key)
            .filter(|node| node.generation == id.generation)
            .map(|node| &mut node.endpoint)
    }

    /// Ids in attach order.
    pub fn ids(&self) -> impl Iterator<Item = EndpointId> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let key = cursor?;
            let node = &self.nodes[key];
            cursor = node.next;
            Some(EndpointId {
                key,
                generation: node.generation,
            })
        })
    }

    /// Visits every endpoint in attach order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(EndpointId, &mut AttachedEndpoint)) {
        let mut cursor = self.head;
        while let Some(key) = cursor {
            let node = &mut self.nodes[key];
            cursor = node.next;
            f(
                EndpointId {
                    key,
                    generation: node.generation,
                },
                &mut node.endpoint,
            );
        }
    }

    /// Unlinks every endpoint, in attach order.
    pub fn drain(&mut self) -> Vec<AttachedEndpoint> {
        let ids: Vec<_> = self.ids().collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Removes nodes whose handler never came back from a callback (the callback
    /// panicked). Returns how many were removed.
    pub fn discard_orphans(&mut self) -> usize {
        let orphans: Vec<_> = self
            .ids()
            .filter(|id| self.get(*id).is_some_and(|it| it.handler.is_none()))
            .collect();
        orphans
            .into_iter()
            .filter(|id| self.remove(*id).is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn keys(list: &EndpointList) -> Vec<usize> { list.ids().map(|id| id.key).collect() }

    #[test]
    fn test_push_preserves_order() {
        let mut list = EndpointList::default();
        let a = list.push_back(idle());
        let b = list.push_back(idle());
        let c = list.push_back(idle());

        assert_eq!(list.len(), 3);
        assert_eq!(list.len_mirror().load(Ordering::SeqCst), 3);
        assert_eq!(keys(&list), vec![a.key, b.key, c.key]);
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let mut list = EndpointList::default();
        let a = list.push_back(idle());
        let b = list.push_back(idle());
        let c = list.push_back(idle());
        let d = list.push_back(idle());

        assert!(list.remove(b).is_some());
        assert_eq!(keys(&list), vec![a.key, c.key, d.key]);

        assert!(list.remove(a).is_some());
        assert_eq!(keys(&list), vec![c.key, d.key]);

        assert!(list.remove(d).is_some());
        assert_eq!(keys(&list), vec![c.key]);

        assert!(list.remove(c).is_some());
        assert!(list.is_empty());
        assert_eq!(list.head, None);
        assert_eq!(list.tail, None);
    }

    #[test]
    fn test_stale_id_does_not_resolve() {
        let mut list = EndpointList::default();
        let first = list.push_back(idle());
        assert!(list.remove(first).is_some());

        // The slab reuses the key, the generation differs.
        let second = list.push_back(idle());
        assert_eq!(first.key, second.key);
        assert_ne!(first.generation, second.generation);

        assert!(!list.contains(first));
        assert!(list.get(first).is_none());
        assert!(list.remove(first).is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_into_endpoint_keeps_interest_and_deadline() {
        let mut list = EndpointList::default();
        let id = list.push_back(idle().with_interest(Interest::WRITABLE));
        list.get_mut(id)
            .unwrap()
            .deadline
            .arm(std::time::Duration::from_secs(5));

        let endpoint = list.remove(id).unwrap().into_endpoint().unwrap();
        assert_eq!(endpoint.interest(), Interest::WRITABLE);
        assert!(endpoint.deadline_remaining().is_some());
    }

    #[test]
    fn test_set_interest_unparks() {
        let mut list = EndpointList::default();
        let id = list.push_back(idle());
        let node = list.get_mut(id).unwrap();
        node.parked = true;

        node.set_interest(node.interest);
        assert!(node.parked);

        node.set_interest(Interest::WRITABLE);
        assert!(!node.parked);
    }

    #[test]
    fn test_discard_orphans_and_drain() {
        let mut list = EndpointList::default();
        let a = list.push_back(idle());
        let b = list.push_back(idle());
        let c = list.push_back(idle());
        drop(list.get_mut(b).unwrap().handler.take());

        assert_eq!(list.discard_orphans(), 1);
        assert_eq!(keys(&list), vec![a.key, c.key]);

        let drained = list.drain();
        assert_eq!(drained.len(), 2);
        assert!(list.is_empty());
    }
}
