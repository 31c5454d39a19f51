//! Typed Kubernetes objects embedded in workload manifests
//!
//! This module defines the small set of Kubernetes resource types Gantry
//! stacks embed in their workload manifests:
//! - ServiceAccount: the in-cluster half of a service identity
//! - Pod: a single-container workload wired to an identity and the table
//!
//! The types are hand-rolled serde structs rather than bindings to a client
//! library: nothing here talks to an API server, the objects only need to
//! serialize into the manifest property bag. Values that are not known until
//! deploy time (the table's generated name, a role's ARN) are carried as
//! reference markers, which is why env values and annotations hold JSON
//! values instead of plain strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Metadata
// =============================================================================

/// Standard Kubernetes ObjectMeta
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations; values may be reference markers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Value>,
}

impl ObjectMeta {
    /// Create new metadata with standard Gantry labels
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let name = name.into();
        let mut labels = BTreeMap::new();
        labels.insert("app.kubernetes.io/name".to_string(), name.clone());
        labels.insert(
            "app.kubernetes.io/managed-by".to_string(),
            "gantry".to_string(),
        );
        Self {
            name,
            namespace: namespace.into(),
            labels,
            annotations: BTreeMap::new(),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation; the value may be a reference marker
    pub fn with_annotation(mut self, key: impl Into<String>, value: Value) -> Self {
        self.annotations.insert(key.into(), value);
        self
    }
}

// =============================================================================
// ServiceAccount
// =============================================================================

/// Kubernetes ServiceAccount
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
}

impl ServiceAccount {
    /// Create a ServiceAccount in the given namespace
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "ServiceAccount".to_string(),
            metadata: ObjectMeta::new(name, namespace),
        }
    }

    /// Add an annotation to the account's metadata
    pub fn with_annotation(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata = self.metadata.with_annotation(key, value);
        self
    }
}

// =============================================================================
// Pod
// =============================================================================

/// Kubernetes Pod
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: PodSpec,
}

impl Pod {
    /// Create a pod running under the given service account
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        service_account_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            metadata: ObjectMeta::new(name, namespace),
            spec: PodSpec {
                service_account_name: service_account_name.into(),
                containers: Vec::new(),
            },
        }
    }

    /// Add a container to the pod spec
    pub fn with_container(mut self, container: Container) -> Self {
        self.spec.containers.push(container);
        self
    }
}

/// Pod spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Service account the pod runs as
    pub service_account_name: String,
    /// Containers
    pub containers: Vec<Container>,
}

/// Container spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image
    pub image: String,
    /// Command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

impl Container {
    /// Create a container with no command override and no environment
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: None,
            env: Vec::new(),
        }
    }

    /// Add an environment variable
    pub fn with_env(mut self, var: EnvVar) -> Self {
        self.env.push(var);
        self
    }
}

/// Environment variable; the value may be a reference marker
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Variable value, literal or marker
    pub value: Value,
}

impl EnvVar {
    /// A variable whose value is already known
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::String(value.into()),
        }
    }

    /// A variable whose value is resolved by the deployment engine
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}
