//! Graph mutation operations
//!
//! Every structural change keeps the producer/consumer maps and value
//! metadata consistent. Rewrites elsewhere in the crate are built exclusively
//! out of these methods.

use crate::error::{OptResult, TransformError};
use crate::ir::Node;

use super::Graph;

impl Graph {
    /// Rewrite input slot `i` of a node to reference `value` (may be `""`).
    /// The inputs vector is extended with empty slots if `i` is past the end,
    /// which is how optional trailing inputs get filled in.
    pub fn update_node_input(&mut self, node_name: &str, i: usize, value: &str) -> bool {
        let Some(node) = self.nodes.get_mut(node_name) else {
            return false;
        };
        if i >= node.inputs.len() {
            node.inputs.resize(i + 1, String::new());
        }
        let old = std::mem::replace(&mut node.inputs[i], value.to_string());

        if !old.is_empty() {
            if let Some(consumers) = self.consumer_map.get_mut(&old) {
                if let Some(pos) = consumers.iter().position(|n| n == node_name) {
                    consumers.remove(pos);
                }
            }
        }
        if !value.is_empty() {
            self.consumer_map
                .entry(value.to_string())
                .or_default()
                .push(node_name.to_string());
        }
        true
    }

    /// Rename output slot `i` of a node to `value`, updating the producer map
    pub fn update_node_output(&mut self, node_name: &str, i: usize, value: &str) -> bool {
        let Some(node) = self.nodes.get_mut(node_name) else {
            return false;
        };
        if i >= node.outputs.len() {
            return false;
        }
        let old = std::mem::replace(&mut node.outputs[i], value.to_string());
        self.producer_map.remove(&old);
        if !value.is_empty() {
            self.producer_map
                .insert(value.to_string(), node_name.to_string());
        }
        true
    }

    /// Transfer the name of `src.outputs[i]` to `dst.outputs[j]`, renaming
    /// `src.outputs[i]` to a fresh value. External observers of the old name
    /// now see `dst`'s output; value metadata follows the name.
    pub fn move_output(&mut self, src: &str, i: usize, dst: &str, j: usize) -> bool {
        let Some(src_node) = self.nodes.get(src) else {
            return false;
        };
        let Some(moved) = src_node.outputs.get(i).cloned() else {
            return false;
        };
        if self.nodes.get(dst).map(|n| n.outputs.len()) <= Some(j) {
            return false;
        }
        let fresh = self.fresh_value_name(&format!("{src}_out{i}r"));
        self.update_node_output(src, i, &fresh);
        self.update_node_output(dst, j, &moved);
        true
    }

    /// Rewrite every input slot on the given nodes that references `old` so
    /// it references `new` instead
    pub fn replace_value_references(&mut self, node_names: &[String], old: &str, new: &str) {
        for name in node_names {
            let Some(node) = self.nodes.get(name) else {
                continue;
            };
            let slots: Vec<usize> = node
                .inputs
                .iter()
                .enumerate()
                .filter(|(_, inp)| inp.as_str() == old)
                .map(|(i, _)| i)
                .collect();
            for i in slots {
                self.update_node_input(name, i, new);
            }
        }
    }

    /// Replace an initializer's shape in place; element count must match.
    /// Value metadata is updated alongside.
    pub fn reshape_initializer(&mut self, name: &str, shape: Vec<i64>) -> OptResult<()> {
        let tensor = self
            .initializers
            .get_mut(name)
            .ok_or_else(|| TransformError::InitializerNotFound(name.to_string()))?;
        tensor.reshape(shape.clone())?;
        if let Some(info) = self.value_infos.get_mut(name) {
            info.set_shape(&shape);
        }
        Ok(())
    }

    /// Permute an initializer's data in place. Value metadata is updated
    /// alongside. This invalidates prior references unless the caller
    /// compensates existing consumers.
    pub fn transpose_initializer(&mut self, name: &str, perm: &[i64]) -> OptResult<()> {
        let tensor = self
            .initializers
            .get_mut(name)
            .ok_or_else(|| TransformError::InitializerNotFound(name.to_string()))?;
        tensor.transpose(perm)?;
        let dims = tensor.dims.clone();
        if let Some(info) = self.value_infos.get_mut(name) {
            info.set_shape(&dims);
        }
        Ok(())
    }

    /// Remove a node, dropping its map entries and the metadata of values
    /// only it produced
    pub fn remove_node(&mut self, name: &str) -> Option<Node> {
        let node = self.nodes.shift_remove(name)?;
        for output in &node.outputs {
            self.producer_map.remove(output);
            if !self.is_graph_output(output) && !self.initializers.contains_key(output) {
                self.value_infos.remove(output);
            }
        }
        for input in &node.inputs {
            if input.is_empty() {
                continue;
            }
            if let Some(consumers) = self.consumer_map.get_mut(input) {
                if let Some(pos) = consumers.iter().position(|n| n == name) {
                    consumers.remove(pos);
                }
            }
        }
        log::debug!("removed node {name}");
        Some(node)
    }

    /// Remove an initializer and its metadata
    pub fn remove_initializer(&mut self, name: &str) -> Option<crate::ir::Tensor> {
        let tensor = self.initializers.remove(name)?;
        self.value_infos.remove(name);
        log::debug!("removed initializer {name}");
        Some(tensor)
    }
}
