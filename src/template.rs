//! Synthesized template types
//!
//! A [`Template`] is the structural output of synthesizing one stack: a map
//! of resource nodes keyed by logical id, each carrying a type, a property
//! bag, and the explicit ordering edges the consuming engine must respect.
//! The template is plain data - it serializes to the JSON/YAML shape the
//! deployment tooling expects and offers the assertion helpers the test
//! suite is built on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A synthesized stack template
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Template {
    /// Resource nodes keyed by logical id
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, TemplateResource>,
}

/// One resource node in a synthesized template
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TemplateResource {
    /// Resource type identifier (e.g. `AWS::EKS::Cluster`)
    #[serde(rename = "Type")]
    pub type_: String,

    /// Declarative property bag; may embed reference markers
    #[serde(rename = "Properties", default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,

    /// Logical ids this resource must be created after
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Template {
    /// Look up a resource by logical id
    pub fn resource(&self, logical_id: &str) -> Option<&TemplateResource> {
        self.resources.get(logical_id)
    }

    /// All resources of the given type, with their logical ids
    pub fn resources_of_type(&self, type_: &str) -> Vec<(&str, &TemplateResource)> {
        self.resources
            .iter()
            .filter(|(_, r)| r.type_ == type_)
            .map(|(id, r)| (id.as_str(), r))
            .collect()
    }

    /// Total number of resources in the template
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Whether the resource at `logical_id` declares an ordering edge on `target`
    pub fn depends_on(&self, logical_id: &str, target: &str) -> bool {
        self.resources
            .get(logical_id)
            .map(|r| r.depends_on.iter().any(|d| d == target))
            .unwrap_or(false)
    }

    /// Serialize the template to pretty-printed JSON
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::serialization(format!("template to JSON: {}", e)))
    }

    /// Serialize the template to YAML
    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| crate::Error::serialization(format!("template to YAML: {}", e)))
    }
}

impl TemplateResource {
    /// Fetch a property by key from the top level of the property bag
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_object().and_then(|m| m.get(key))
    }
}
