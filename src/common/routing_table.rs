//! Simplified Kademlia routing table

use std::collections::BTreeMap;
use std::slice::Iter;

use tracing::debug;

use crate::common::{find_closest_n, find_closest_one, Id, Node, NodeState};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 8;
/// Alpha = the default number of nodes returned from local finds, and queried
/// in every round of an iterative lookup.
pub const ALPHA: usize = 3;

#[derive(Debug, Clone, PartialEq)]
/// Outcome of adding a node to a [KBucket] or a [RoutingTable].
pub enum Admission {
    /// Node was already known, its address was updated and moved to the tail.
    Updated,
    /// Node was appended to a bucket with free capacity.
    Inserted,
    /// Bucket is full, the least recently seen node was marked
    /// [NodeState::AwaitingProbe] and should be pinged.
    Probe {
        /// The least recently seen node to ping.
        lru: Node,
        /// The node to insert if `lru` does not respond.
        candidate: Node,
    },
    /// Node was not added: it is this table's own node, or its bucket is full
    /// and already waiting for a probe.
    Dropped,
}

#[derive(Debug, Clone)]
/// Simplified Kademlia routing table
pub struct RoutingTable {
    local: Node,
    buckets: BTreeMap<u8, KBucket>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] around the local node.
    pub fn new(local: Node) -> Self {
        RoutingTable {
            local,
            buckets: BTreeMap::new(),
        }
    }

    /// Returns the [Id] of this node, where the distance is measured from.
    pub fn id(&self) -> &Id {
        &self.local.id
    }

    /// Returns the local node.
    pub fn local(&self) -> &Node {
        &self.local
    }

    /// Returns the map of partitions and their [KBucket]
    pub fn buckets(&self) -> &BTreeMap<u8, KBucket> {
        &self.buckets
    }

    /// Returns the partition a node or a target belongs to, relative to this table's id.
    pub fn partition(&self, id: &Id) -> u8 {
        id.distance(self.id()).partition()
    }

    // === Public Methods ===

    /// Attempts to add a node to this routing table.
    ///
    /// See [KBucket::add] for the admission algorithm.
    pub fn add(&mut self, node: Node) -> Admission {
        if node.id == *self.id() {
            return Admission::Dropped;
        }

        let partition = self.partition(&node.id);

        self.buckets.entry(partition).or_default().add(node)
    }

    /// Remove a node from this routing table, no-op if it is not there.
    pub fn remove(&mut self, node_id: &Id) {
        let partition = self.partition(node_id);

        if let Some(bucket) = self.buckets.get_mut(&partition) {
            bucket.remove(node_id);
        }
    }

    /// Apply the result of pinging the least recently seen node of a full bucket.
    ///
    /// If `lru` responded, it is kept and moved to the tail, and `candidate` is dropped.
    /// Otherwise it is evicted in favor of `candidate`.
    ///
    /// Returns [Admission::Inserted] if `candidate` took the evicted slot.
    pub fn resolve_probe(&mut self, lru: &Node, candidate: Node, alive: bool) -> Admission {
        let partition = self.partition(&lru.id);

        match self.buckets.get_mut(&partition) {
            Some(bucket) => bucket.resolve_probe(lru, candidate, alive),
            None => Admission::Dropped,
        }
    }

    /// Closest known nodes to a target, up to [ALPHA] of them.
    ///
    /// If `include_self` and the target is this node, returns only the local node.
    ///
    /// Otherwise starts from the target's own partition, and if it has fewer than
    /// [ALPHA] nodes, continues through the other populated partitions ordered by
    /// how far their index is from the target's partition.
    pub fn find_local(&self, target: &Id, include_self: bool) -> Vec<Node> {
        if include_self && target == self.id() {
            return vec![self.local.clone()];
        }

        let partition = self.partition(target);

        let mut found = self
            .buckets
            .get(&partition)
            .map(|bucket| bucket.find_closest(target, ALPHA))
            .unwrap_or_default();

        if found.len() >= ALPHA {
            return found;
        }

        for other in self.partitions_by_proximity(partition) {
            if let Some(bucket) = self.buckets.get(&other) {
                found.extend(bucket.find_closest(target, ALPHA - found.len()));
            }

            if found.len() >= ALPHA {
                break;
            }
        }

        found
    }

    /// The single closest known node to a target, from [Self::find_local].
    pub fn find_one(&self, target: &Id) -> Option<Node> {
        find_closest_one(target, &self.find_local(target, false))
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|bucket| bucket.is_empty())
    }

    /// Return the number of nodes in this routing table.
    pub fn size(&self) -> usize {
        self.buckets
            .values()
            .fold(0, |acc, bucket| acc + bucket.count())
    }

    /// Returns an iterator over the nodes in this routing table, by partition.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }

    /// Export an owned vector of nodes from this routing table.
    pub fn to_owned_nodes(&self) -> Vec<Node> {
        self.nodes().cloned().collect()
    }

    pub fn contains(&self, node_id: &Id) -> bool {
        let partition = self.partition(node_id);

        self.buckets
            .get(&partition)
            .is_some_and(|bucket| bucket.contains(node_id))
    }

    // === Private Methods ===

    /// Populated partitions other than `base`, closest index first, ties broken
    /// by the lower index.
    fn partitions_by_proximity(&self, base: u8) -> Vec<u8> {
        let mut partitions: Vec<u8> = self
            .buckets
            .iter()
            .filter(|(partition, bucket)| **partition != base && !bucket.is_empty())
            .map(|(partition, _)| *partition)
            .collect();

        partitions.sort_by_key(|partition| (partition.abs_diff(base), *partition));

        partitions
    }
}

/// Kbuckets are similar to LRU caches that checks and evicts unresponsive nodes,
/// without dropping any responsive nodes in the process.
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Nodes in the k-bucket, sorted by the least recently seen.
    nodes: Vec<Node>,
}

impl KBucket {
    pub fn new() -> Self {
        KBucket {
            nodes: Vec::with_capacity(MAX_BUCKET_SIZE_K),
        }
    }

    // === Getters ===

    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.nodes.len() >= MAX_BUCKET_SIZE_K
    }

    pub fn iter(&self) -> Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Least recently seen node.
    pub fn head(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.iter().any(|node| node.id == *id)
    }

    pub fn has(&self, node: &Node) -> bool {
        self.iter().any(|entry| entry.same_contact(node))
    }

    // === Public Methods ===

    /// Up to `n` nodes closest to the target, see [find_closest_n].
    pub fn find_closest(&self, target: &Id, n: usize) -> Vec<Node> {
        find_closest_n(n, target, &self.nodes)
    }

    /// The closest node to the target, None if the bucket is empty.
    pub fn find_one(&self, target: &Id) -> Option<Node> {
        self.find_closest(target, 1).pop()
    }

    /// Admission algorithm:
    ///
    /// 1. Known node: replace it and move it to the tail, clearing any pending probe.
    /// 2. Free capacity: append at the tail.
    /// 3. Full bucket with the head already awaiting a probe: drop the incoming node.
    /// 4. Full bucket: mark the head as awaiting a probe, and ask the caller to ping it.
    pub fn add(&mut self, incoming: Node) -> Admission {
        if self.has(&incoming) {
            self.update(incoming);

            Admission::Updated
        } else if !self.is_full() {
            self.nodes.push(Node {
                state: NodeState::Idle,
                ..incoming
            });

            Admission::Inserted
        } else {
            let head = &mut self.nodes[0];

            if head.awaiting_probe() {
                debug!(lru = ?head.id, dropped = ?incoming.id, "Probe in flight, dropping node");

                return Admission::Dropped;
            }

            head.state = NodeState::AwaitingProbe;

            Admission::Probe {
                lru: head.clone(),
                candidate: incoming,
            }
        }
    }

    /// Replace the node with the same id and move it to the tail.
    pub fn update(&mut self, node: Node) {
        self.remove(&node.id);

        self.nodes.push(Node {
            state: NodeState::Idle,
            ..node
        });
    }

    pub fn remove(&mut self, node_id: &Id) {
        self.nodes.retain(|node| node.id != *node_id);
    }

    /// See [RoutingTable::resolve_probe].
    pub fn resolve_probe(&mut self, lru: &Node, candidate: Node, alive: bool) -> Admission {
        let Some(index) = self.iter().position(|n| n.id == lru.id) else {
            // Already removed, treat the slot as free.
            return self.admit_after_probe(candidate);
        };

        if alive || !self.nodes[index].awaiting_probe() {
            // Responded, or got recontacted while the probe was in flight.
            let node = self.nodes.remove(index);
            self.nodes.push(Node {
                state: NodeState::Idle,
                ..node
            });

            debug!(lru = ?lru.id, dropped = ?candidate.id, "Probe succeeded, keeping node");

            return Admission::Dropped;
        }

        self.nodes.remove(index);

        debug!(evicted = ?lru.id, candidate = ?candidate.id, "Probe failed, evicting node");

        self.admit_after_probe(candidate)
    }

    // === Private Methods ===

    fn admit_after_probe(&mut self, candidate: Node) -> Admission {
        if self.has(&candidate) {
            self.update(candidate);

            return Admission::Updated;
        }

        if self.is_full() {
            return Admission::Dropped;
        }

        self.nodes.push(Node {
            state: NodeState::Idle,
            ..candidate
        });

        Admission::Inserted
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}
