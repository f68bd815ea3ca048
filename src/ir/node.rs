//! Node and attribute types
//!
//! A node is `{op_type, domain, attributes, inputs, outputs}`. Inputs refer
//! to values by name; an empty string marks an absent optional input. The
//! optimizer treats `op_type` and `domain` as opaque dispatch labels.

use super::tensor::Tensor;

/// Typed attribute payload
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Single integer
    Int(i64),
    /// Integer list
    Ints(Vec<i64>),
    /// Single float
    Float(f32),
    /// Float list
    Floats(Vec<f32>),
    /// String
    Str(String),
    /// Embedded tensor (e.g. the `value` of a `Constant` node)
    Tensor(Tensor),
}

/// Named node attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Attribute payload
    pub value: AttrValue,
}

impl Attribute {
    /// Create an integer attribute
    pub fn int(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            value: AttrValue::Int(value),
        }
    }

    /// Create an integer-list attribute
    pub fn ints(name: &str, values: Vec<i64>) -> Self {
        Self {
            name: name.to_string(),
            value: AttrValue::Ints(values),
        }
    }
}

/// A typed operation in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique node name
    pub name: String,
    /// Operator type, e.g. `"Transpose"`
    pub op_type: String,
    /// Operator domain; empty for the default domain
    pub domain: String,
    /// Input value names; `""` marks an absent optional input
    pub inputs: Vec<String>,
    /// Output value names
    pub outputs: Vec<String>,
    /// Node attributes
    pub attributes: Vec<Attribute>,
}

impl Node {
    /// Create a node in the default domain
    pub fn new(op_type: &str, inputs: &[&str], outputs: &[&str], name: &str) -> Self {
        Self {
            name: name.to_string(),
            op_type: op_type.to_string(),
            domain: String::new(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            attributes: Vec::new(),
        }
    }

    /// Set the domain, builder-style
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    /// Attach an attribute, builder-style
    pub fn with_attr(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Whether this node lives in the default (`""` / `"ai.onnx"`) domain
    pub fn is_default_domain(&self) -> bool {
        self.domain.is_empty() || self.domain == "ai.onnx"
    }

    /// Whether this node is the given default-domain operator
    pub fn is_op(&self, op_type: &str) -> bool {
        self.op_type == op_type && self.is_default_domain()
    }

    /// Get attribute by name
    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get integer attribute
    pub fn attr_int(&self, name: &str) -> Option<i64> {
        match self.get_attribute(name)?.value {
            AttrValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Get integer attribute with a default
    pub fn attr_int_or(&self, name: &str, default: i64) -> i64 {
        self.attr_int(name).unwrap_or(default)
    }

    /// Get integer-list attribute
    pub fn attr_ints(&self, name: &str) -> Option<&[i64]> {
        match &self.get_attribute(name)?.value {
            AttrValue::Ints(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Get tensor attribute
    pub fn attr_tensor(&self, name: &str) -> Option<&Tensor> {
        match &self.get_attribute(name)?.value {
            AttrValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Set or update an integer attribute
    pub fn set_attr_int(&mut self, name: &str, value: i64) {
        for attr in &mut self.attributes {
            if attr.name == name {
                attr.value = AttrValue::Int(value);
                return;
            }
        }
        self.attributes.push(Attribute::int(name, value));
    }

    /// Set or update an integer-list attribute
    pub fn set_attr_ints(&mut self, name: &str, values: Vec<i64>) {
        for attr in &mut self.attributes {
            if attr.name == name {
                attr.value = AttrValue::Ints(values);
                return;
            }
        }
        self.attributes.push(Attribute::ints(name, values));
    }

    /// Remove an attribute by name
    pub fn clear_attr(&mut self, name: &str) -> Option<Attribute> {
        let pos = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(pos))
    }

    /// Check if the node has an attribute
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Replace this node's attributes with a copy of another node's
    pub fn copy_attributes_from(&mut self, other: &Node) {
        self.attributes = other.attributes.clone();
    }
}
