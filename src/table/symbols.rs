//! Per-architecture symbol maps built from one formula table.

use std::collections::{BTreeSet, HashMap};

/// Symbols known for one architecture pass
///
/// Built by the table builder, read by the resolver, discarded after the
/// architecture's metrics are emitted.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Auxiliary fragments, keyed without the leading `#`
    pub aux: HashMap<String, String>,

    /// Formula of every info and topdown metric, keyed by table name
    pub info: HashMap<String, String>,

    /// Formula of every topdown node
    pub nodes: HashMap<String, String>,

    /// Topdown table name → emitted metric name (`tma_*`)
    pub metric_names: HashMap<String, String>,

    /// Ancestor stack as left by the last topdown row
    pub parents: Vec<String>,

    /// Parent node → child node names, sorted
    pub children: HashMap<String, BTreeSet<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a topdown node and its canonical metric name
    pub fn add_node(&mut self, name: &str, formula: &str) -> String {
        let metric_name = format!("tma_{}", name.to_lowercase());
        self.nodes.insert(name.to_string(), formula.to_string());
        self.info.insert(name.to_string(), formula.to_string());
        self.metric_names
            .insert(name.to_string(), metric_name.clone());
        metric_name
    }

    pub fn add_info(&mut self, name: &str, formula: &str) {
        self.info.insert(name.to_string(), formula.to_string());
    }

    pub fn add_aux(&mut self, name: &str, formula: &str) {
        let key = name.strip_prefix('#').unwrap_or(name);
        self.aux.insert(key.to_string(), formula.to_string());
    }

    pub fn add_child(&mut self, parent: &str, child: &str) {
        self.children
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
    }

    /// Children of a node in name order
    pub fn children_of(&self, parent: &str) -> Vec<&str> {
        self.children
            .get(parent)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Output name a reference to `name` resolves to
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.metric_names
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }
}
