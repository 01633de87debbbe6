//! Pointer hubs: the incoming side of a targetable vertex.

use std::fmt;

use indexmap::IndexMap;

use crate::address::Address;
use crate::catalog::PointerType;
use crate::edges::EdgeIndex;

/// Structural change of an incoming edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubChange {
    Added,
    Removed,
}

/// Delivered to hub subscribers once per matching edge change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEvent {
    pub change: HubChange,
    pub source: Address,
    pub target: Address,
    pub pointer_type: PointerType,
}

/// Handle returned by every `subscribe_*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

type HubListener = Box<dyn FnMut(&HubEvent)>;

struct HubSubscription {
    target: Address,
    filter: Vec<PointerType>,
    listener: HubListener,
}

/// Registered hub listeners, keyed by subscription id.
#[derive(Default)]
pub(crate) struct HubSubscribers {
    entries: IndexMap<SubscriptionId, HubSubscription>,
}

impl fmt::Debug for HubSubscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubSubscribers")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl HubSubscribers {
    pub(crate) fn insert(
        &mut self,
        id: SubscriptionId,
        target: Address,
        filter: &[PointerType],
        listener: HubListener,
    ) {
        self.entries.insert(
            id,
            HubSubscription {
                target,
                filter: filter.to_vec(),
                listener,
            },
        );
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    /// Calls every listener watching `event.target` whose filter matches.
    pub(crate) fn notify(&mut self, event: &HubEvent) {
        for subscription in self.entries.values_mut() {
            if subscription.target != event.target {
                continue;
            }
            if !subscription.filter.is_empty() && !subscription.filter.contains(&event.pointer_type)
            {
                continue;
            }
            (subscription.listener)(event);
        }
    }
}

/// Read-only view of the pointers targeting one vertex.
#[derive(Debug, Clone, Copy)]
pub struct PointerHub<'a> {
    address: &'a Address,
    edges: &'a EdgeIndex,
}

impl<'a> PointerHub<'a> {
    pub(crate) fn new(address: &'a Address, edges: &'a EdgeIndex) -> Self {
        PointerHub { address, edges }
    }

    pub fn address(&self) -> &Address {
        self.address
    }

    /// Source addresses of every incoming pointer, in insertion order.
    pub fn incoming(&self) -> Vec<Address> {
        self.edges
            .incoming(self.address)
            .into_iter()
            .map(|(source, _)| source)
            .collect()
    }

    /// Incoming sources whose pointer type is one of `types`.
    pub fn incoming_of(&self, types: &[PointerType]) -> Vec<Address> {
        self.edges
            .incoming(self.address)
            .into_iter()
            .filter(|(_, t)| types.contains(t))
            .map(|(source, _)| source)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.edges.incoming_count(self.address)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, source: &Address) -> bool {
        self.edges.has_incoming(self.address, source)
    }
}
