//! Resource nodes, dependency edges, and stack synthesis
//!
//! A [`Stack`] is a named, ordered collection of [`ResourceNode`]s. Nodes are
//! added during construction without any validation; [`Stack::synth`] is the
//! single point where the graph is checked (duplicate logical ids, dangling
//! references, dependency cycles) and compiled into a [`Template`].
//!
//! Ordering between resources is expressed two ways, both consumed by the
//! external deployment engine rather than by this crate:
//!
//! - explicit edges, declared with [`ResourceNode::with_dependency`] or
//!   [`Stack::add_dependency`], which synthesize to `DependsOn`;
//! - reference markers ([`reference`], [`attribute`]) embedded in property
//!   bags, which stand in for names the engine generates at deploy time.
//!
//! Both kinds of edge must resolve to a node in the same stack.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use crate::template::{Template, TemplateResource};
use crate::{Error, Result};

/// A reference marker standing in for the generated name of another resource
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// A reference marker standing in for a generated attribute of another
/// resource (e.g. a role ARN or a cluster's identity issuer)
pub fn attribute(logical_id: &str, attr: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attr] })
}

/// One declarative resource in a stack
///
/// Nodes are inert data: a logical id, a type identifier, a property bag,
/// and the ids of nodes that must be created first.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceNode {
    logical_id: String,
    type_: String,
    properties: Value,
    depends_on: Vec<String>,
}

impl ResourceNode {
    /// Create a new resource node
    pub fn new(logical_id: impl Into<String>, type_: impl Into<String>, properties: Value) -> Self {
        Self {
            logical_id: logical_id.into(),
            type_: type_.into(),
            properties,
            depends_on: Vec::new(),
        }
    }

    /// Declare an explicit ordering edge on another node
    pub fn with_dependency(mut self, target: impl Into<String>) -> Self {
        self.depends_on.push(target.into());
        self
    }

    /// Declare explicit ordering edges on several nodes at once
    pub fn with_dependencies<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Logical id of this node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Resource type identifier
    pub fn type_(&self) -> &str {
        &self.type_
    }

    /// The declarative property bag
    pub fn properties(&self) -> &Value {
        &self.properties
    }
}

/// A named, deployable collection of declarative resources
#[derive(Clone, Debug, Default)]
pub struct Stack {
    name: String,
    resources: Vec<ResourceNode>,
    edges: Vec<(String, String)>,
}

impl Stack {
    /// Create an empty stack with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Stack name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a resource node to the stack
    ///
    /// Duplicate logical ids are not rejected here; they surface when the
    /// stack is synthesized.
    pub fn add_resource(&mut self, node: ResourceNode) {
        self.resources.push(node);
    }

    /// Add several resource nodes at once
    pub fn add_resources(&mut self, nodes: impl IntoIterator<Item = ResourceNode>) {
        self.resources.extend(nodes);
    }

    /// Declare an ordering edge between two nodes already in the stack
    ///
    /// Unknown endpoints are reported at synthesis, not here.
    pub fn add_dependency(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.push((from.into(), to.into()));
    }

    /// Number of resource nodes currently in the stack
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Synthesize the stack into a template
    ///
    /// This is the only validation point in the crate: duplicate logical
    /// ids, dangling references (explicit edges and embedded markers), and
    /// dependency cycles are all reported here.
    pub fn synth(&self) -> Result<Template> {
        debug!(stack = %self.name, resources = self.resources.len(), "synthesizing stack");

        // Duplicate logical ids would silently overwrite each other in the
        // template map.
        let mut nodes: BTreeMap<&str, &ResourceNode> = BTreeMap::new();
        for node in &self.resources {
            if nodes.insert(node.logical_id(), node).is_some() {
                return Err(Error::validation(format!(
                    "duplicate logical id '{}' in stack '{}'",
                    node.logical_id(),
                    self.name
                )));
            }
        }

        // Explicit ordering edges per node: the node's own edges plus any
        // declared at stack level, deduplicated and sorted for stable output.
        let mut explicit: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for node in &self.resources {
            let mut targets = node.depends_on.clone();
            targets.extend(
                self.edges
                    .iter()
                    .filter(|(from, _)| from == node.logical_id())
                    .map(|(_, to)| to.clone()),
            );
            targets.sort();
            targets.dedup();
            explicit.insert(node.logical_id(), targets);
        }
        for (from, _) in &self.edges {
            if !nodes.contains_key(from.as_str()) {
                return Err(Error::validation(format!(
                    "dependency declared from unknown resource '{}' in stack '{}'",
                    from, self.name
                )));
            }
        }

        // Every edge, explicit or embedded in a property bag, must resolve
        // to a node in this stack.
        let mut adjacency: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for node in &self.resources {
            let mut targets = explicit[node.logical_id()].clone();
            collect_references(&node.properties, &mut targets);
            for target in &targets {
                if !nodes.contains_key(target.as_str()) {
                    return Err(Error::dangling(node.logical_id(), target.clone()));
                }
            }
            adjacency.insert(node.logical_id(), targets);
        }

        if let Some(on_cycle) = find_cycle(&adjacency) {
            return Err(Error::cycle(on_cycle));
        }

        let resources = self
            .resources
            .iter()
            .map(|node| {
                (
                    node.logical_id().to_string(),
                    TemplateResource {
                        type_: node.type_().to_string(),
                        properties: node.properties.clone(),
                        depends_on: explicit[node.logical_id()].clone(),
                    },
                )
            })
            .collect();

        Ok(Template { resources })
    }
}

/// Collect the logical ids referenced by markers inside a property bag
fn collect_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    out.push(target.clone());
                    return;
                }
                if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                    if let Some(Value::String(target)) = parts.first() {
                        out.push(target.clone());
                        return;
                    }
                }
            }
            for nested in map.values() {
                collect_references(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

/// Depth-first search for a cycle; returns a node on the cycle if one exists
fn find_cycle(adjacency: &BTreeMap<&str, Vec<String>>) -> Option<String> {
    const UNVISITED: u8 = 0;
    const IN_PROGRESS: u8 = 1;
    const DONE: u8 = 2;

    fn visit(
        node: &str,
        adjacency: &BTreeMap<&str, Vec<String>>,
        state: &mut BTreeMap<String, u8>,
    ) -> Option<String> {
        match state.get(node).copied().unwrap_or(UNVISITED) {
            IN_PROGRESS => return Some(node.to_string()),
            DONE => return None,
            _ => {}
        }
        state.insert(node.to_string(), IN_PROGRESS);
        if let Some(targets) = adjacency.get(node) {
            for target in targets {
                if let Some(found) = visit(target, adjacency, state) {
                    return Some(found);
                }
            }
        }
        state.insert(node.to_string(), DONE);
        None
    }

    let mut state = BTreeMap::new();
    for node in adjacency.keys() {
        if let Some(found) = visit(node, adjacency, &mut state) {
            return Some(found);
        }
    }
    None
}
