use std::collections::BTreeMap;

use crate::common::{Id, Node, RoutingTable};

/// Information about this node and a summary of its routing table.
#[derive(Debug, Clone)]
pub struct Info {
    local: Node,
    routing_table_size: usize,
    buckets: BTreeMap<u8, usize>,
    stored_values: usize,
}

impl Info {
    /// This Node's [Id]
    pub fn id(&self) -> &Id {
        &self.local.id
    }

    /// This node as advertised to others.
    pub fn local(&self) -> &Node {
        &self.local
    }

    /// Number of contacts in the routing table.
    pub fn routing_table_size(&self) -> usize {
        self.routing_table_size
    }

    /// Number of contacts in each populated partition.
    pub fn buckets(&self) -> &BTreeMap<u8, usize> {
        &self.buckets
    }

    /// Number of keys in the local store.
    pub fn stored_values(&self) -> usize {
        self.stored_values
    }

    pub(crate) fn new(routing_table: &RoutingTable, stored_values: usize) -> Self {
        Self {
            local: routing_table.local().clone(),
            routing_table_size: routing_table.size(),
            buckets: routing_table
                .buckets()
                .iter()
                .filter(|(_, bucket)| !bucket.is_empty())
                .map(|(partition, bucket)| (*partition, bucket.count()))
                .collect(),
            stored_values,
        }
    }
}
