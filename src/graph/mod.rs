//! Graph representation and manipulation
//!
//! [`Graph`] owns the nodes, initializers, and value metadata of one model
//! graph and keeps producer/consumer maps in sync with every structural
//! change. All rewrites go through the mutation methods here, which makes
//! this module the single point of integrity enforcement for the optimizer.

pub mod accessors;
pub mod maps;
pub mod mutators;

pub use maps::{ConsumerMap, InitializerMap, NodeMap, ProducerMap, ValueConsumers, ValueInfoMap};

use rustc_hash::FxHashMap;

use crate::ir::{DataType, Node, Tensor, ValueInfo};

/// A directed graph of typed operations over named values
///
/// Each value is produced by at most one node output, or is a graph input or
/// an initializer. Node inputs reference values by name; the empty string
/// marks an absent optional input.
#[derive(Debug, Default)]
pub struct Graph {
    /// Node name → node, in insertion order
    pub(crate) nodes: NodeMap,
    /// Output value name → producer node name
    pub(crate) producer_map: ProducerMap,
    /// Value name → consumer node names (one entry per consuming slot)
    pub(crate) consumer_map: ConsumerMap,
    /// Initializer name → tensor
    pub(crate) initializers: InitializerMap,
    /// Value name → metadata
    pub(crate) value_infos: ValueInfoMap,
    /// Declared graph inputs
    pub(crate) inputs: Vec<String>,
    /// Declared graph outputs
    pub(crate) outputs: Vec<String>,
    /// Domain → opset version
    pub(crate) opsets: FxHashMap<String, i64>,
    /// Monotonic counter for fresh node/value names
    next_id: u64,
}

impl Graph {
    /// Create an empty graph with the given default-domain opset
    pub fn new(opset: i64) -> Self {
        let mut g = Self::default();
        g.opsets.insert(String::new(), opset);
        g
    }

    /// Set the opset version of a domain
    pub fn set_opset(&mut self, domain: &str, version: i64) {
        self.opsets.insert(domain.to_string(), version);
    }

    /// Declare a graph input and register its metadata
    pub fn add_graph_input(&mut self, info: ValueInfo) {
        self.inputs.push(info.name.clone());
        self.value_infos.insert(info.name.clone(), info);
    }

    /// Declare a graph output and register its metadata
    pub fn add_graph_output(&mut self, info: ValueInfo) {
        self.outputs.push(info.name.clone());
        self.value_infos.insert(info.name.clone(), info);
    }

    /// Register metadata for an intermediate value
    pub fn set_value_info(&mut self, info: ValueInfo) {
        self.value_infos.insert(info.name.clone(), info);
    }

    /// Attach a constant tensor, registering metadata derived from it
    pub fn add_initializer(&mut self, tensor: Tensor) {
        let info = ValueInfo::new(&tensor.name, tensor.dtype(), &tensor.dims);
        self.value_infos.insert(tensor.name.clone(), info);
        self.initializers.insert(tensor.name.clone(), tensor);
    }

    /// Append a caller-constructed node, wiring it into the lookup maps
    pub fn push_node(&mut self, node: Node) {
        let name = node.name.clone();
        for output in &node.outputs {
            if !output.is_empty() {
                self.producer_map.insert(output.clone(), name.clone());
            }
        }
        for input in &node.inputs {
            if !input.is_empty() {
                self.consumer_map
                    .entry(input.clone())
                    .or_default()
                    .push(name.clone());
            }
        }
        self.nodes.insert(name, node);
    }

    /// Allocate a fresh node with generated output names and append it.
    /// Returns the node name.
    pub fn add_node(
        &mut self,
        op_type: &str,
        inputs: &[String],
        num_outputs: usize,
        domain: &str,
    ) -> String {
        let name = self.fresh_node_name(op_type);
        let outputs: Vec<String> = (0..num_outputs)
            .map(|j| format!("{name}_out{j}"))
            .collect();
        let node = Node {
            name: name.clone(),
            op_type: op_type.to_string(),
            domain: domain.to_string(),
            inputs: inputs.to_vec(),
            outputs,
            attributes: Vec::new(),
        };
        self.push_node(node);
        name
    }

    /// Add a fresh int64 initializer; returns its generated name
    pub fn add_initializer_i64(&mut self, shape: Vec<i64>, data: Vec<i64>) -> String {
        let name = self.fresh_value_name("const");
        let mut tensor = Tensor {
            name: name.clone(),
            dims: shape,
            data: crate::ir::TensorData::I64(data),
        };
        if tensor.numel() != tensor.data.len() {
            tensor.dims = vec![tensor.data.len() as i64];
        }
        self.add_initializer(tensor);
        name
    }

    /// Add a fresh int32 initializer; returns its generated name
    pub fn add_initializer_i32(&mut self, shape: Vec<i64>, data: Vec<i32>) -> String {
        let name = self.fresh_value_name("const");
        let mut tensor = Tensor {
            name: name.clone(),
            dims: shape,
            data: crate::ir::TensorData::I32(data),
        };
        if tensor.numel() != tensor.data.len() {
            tensor.dims = vec![tensor.data.len() as i64];
        }
        self.add_initializer(tensor);
        name
    }

    /// Copy value metadata from `src` to `dst` (no-op when `src` has none)
    pub fn copy_value_info(&mut self, src: &str, dst: &str) {
        if let Some(info) = self.value_infos.get(src) {
            let mut copy = info.clone();
            copy.name = dst.to_string();
            self.value_infos.insert(dst.to_string(), copy);
        }
    }

    pub(crate) fn fresh_node_name(&mut self, op_type: &str) -> String {
        loop {
            let candidate = format!("{}_{}", op_type.to_lowercase(), self.next_id);
            self.next_id += 1;
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub(crate) fn fresh_value_name(&mut self, base: &str) -> String {
        loop {
            let candidate = format!("{}_{}", base, self.next_id);
            self.next_id += 1;
            if !self.producer_map.contains_key(&candidate)
                && !self.initializers.contains_key(&candidate)
                && !self.value_infos.contains_key(&candidate)
            {
                return candidate;
            }
        }
    }
}

/// Convenience: a fully fixed-shape float value info
pub fn f32_info(name: &str, dims: &[i64]) -> ValueInfo {
    ValueInfo::new(name, DataType::Float, dims)
}
