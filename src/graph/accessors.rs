//! Graph query operations

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::ir::{DataType, Dim, Node, Tensor, ValueInfo};

use super::maps::ValueConsumers;
use super::Graph;

impl Graph {
    /// Opset version of a domain, if declared
    pub fn opset(&self, domain: &str) -> Option<i64> {
        self.opsets.get(domain).copied()
    }

    /// Get a node by name
    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Get a mutable node by name
    ///
    /// Only attribute mutation is safe through this handle; input/output
    /// rewiring must go through the mutator methods so the maps stay in sync.
    pub fn get_node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node names in topological order
    ///
    /// Insertion order is used among ready nodes so an already-sorted graph
    /// comes back unchanged. Nodes on a cycle (malformed input) are appended
    /// at the end in insertion order.
    pub fn sorted_node_names(&self) -> Vec<String> {
        let mut indegree: FxHashMap<&str, usize> = FxHashMap::default();
        for node in self.nodes.values() {
            let mut count = 0;
            for input in &node.inputs {
                if input.is_empty() {
                    continue;
                }
                if let Some(producer) = self.producer_map.get(input) {
                    if producer != &node.name {
                        count += 1;
                    }
                }
            }
            indegree.insert(node.name.as_str(), count);
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .values()
            .filter(|n| indegree[n.name.as_str()] == 0)
            .map(|n| n.name.as_str())
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());
            let node = &self.nodes[name];
            for output in &node.outputs {
                let Some(consumers) = self.consumer_map.get(output) else {
                    continue;
                };
                for consumer in consumers {
                    if consumer == name {
                        continue;
                    }
                    if let Some(count) = indegree.get_mut(consumer.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            queue.push_back(consumer.as_str());
                        }
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            for node in self.nodes.values() {
                if !order.iter().any(|n| n == &node.name) {
                    order.push(node.name.clone());
                }
            }
        }
        order
    }

    /// Name of the node producing a value
    pub fn get_producer_name(&self, value: &str) -> Option<&str> {
        self.producer_map.get(value).map(|s| s.as_str())
    }

    /// The node producing a value
    pub fn get_producer(&self, value: &str) -> Option<&Node> {
        self.producer_map
            .get(value)
            .and_then(|name| self.nodes.get(name))
    }

    /// Consumers of a value
    ///
    /// The list is deduplicated. `comprehensive` is false when the value is a
    /// declared graph output: external observers may read it, so the name
    /// must be preserved by rewrites.
    pub fn get_value_consumers(&self, value: &str) -> ValueConsumers {
        let mut nodes = Vec::new();
        if let Some(consumers) = self.consumer_map.get(value) {
            for name in consumers {
                if !nodes.iter().any(|n| n == name) {
                    nodes.push(name.clone());
                }
            }
        }
        ValueConsumers {
            nodes,
            comprehensive: !self.is_graph_output(value),
        }
    }

    /// Whether anything observes the value (a consuming node or the graph
    /// output list)
    pub fn has_value_consumers(&self, value: &str) -> bool {
        self.consumer_map
            .get(value)
            .map(|c| !c.is_empty())
            .unwrap_or(false)
            || self.is_graph_output(value)
    }

    /// Constant tensor backing a value: an initializer, or the payload of a
    /// producing `Constant` node
    pub fn get_constant(&self, value: &str) -> Option<&Tensor> {
        if let Some(init) = self.initializers.get(value) {
            return Some(init);
        }
        let producer = self.get_producer(value)?;
        if producer.is_op("Constant") {
            return producer.attr_tensor("value");
        }
        None
    }

    /// Get an initializer by name
    pub fn get_initializer(&self, name: &str) -> Option<&Tensor> {
        self.initializers.get(name)
    }

    /// Whether a value is an initializer
    pub fn is_initializer(&self, name: &str) -> bool {
        self.initializers.contains_key(name)
    }

    /// Whether a value is a declared graph input
    pub fn is_graph_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|i| i == name)
    }

    /// Whether a value is a declared graph output
    pub fn is_graph_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    /// Declared graph input names
    pub fn graph_inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Declared graph output names
    pub fn graph_outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Metadata of a value
    pub fn get_value_info(&self, name: &str) -> Option<&ValueInfo> {
        self.value_infos.get(name)
    }

    /// Mutable metadata of a value
    pub fn get_value_info_mut(&mut self, name: &str) -> Option<&mut ValueInfo> {
        self.value_infos.get_mut(name)
    }

    /// Shape of a value, if known
    pub fn value_shape(&self, name: &str) -> Option<&[Dim]> {
        self.value_infos.get(name)?.shape.as_deref()
    }

    /// Rank of a value, if known
    pub fn value_rank(&self, name: &str) -> Option<usize> {
        self.value_shape(name).map(|s| s.len())
    }

    /// Element type of a value, if known
    pub fn value_dtype(&self, name: &str) -> Option<DataType> {
        self.value_infos.get(name).map(|i| i.dtype)
    }
}
