//! Cluster, compatibility layer, add-on, and service identities
//!
//! The [`Cluster`] construct describes a managed Kubernetes endpoint pinned
//! to one engine version. Versions at or above [`KubernetesVersion::V1_29`]
//! additionally emit an explicit compatibility layer node the cluster
//! references, because the deployment engine cannot auto-discover execution
//! shims above that version.
//!
//! Everything that attaches to a cluster lives here too: the pod-identity
//! [`Addon`], [`KubernetesManifest`] nodes applying objects in-cluster, and
//! (in [`identity`]) the two service identity binding variants.

pub mod identity;

use serde_json::{json, Value};

use crate::stack::{attribute, reference, ResourceNode};

pub use identity::{FederatedServiceAccount, PodIdentityBinding, ServiceIdentity};

/// Name of the add-on that enables pod-identity associations
pub const POD_IDENTITY_ADDON: &str = "eks-pod-identity-agent";

// =============================================================================
// Kubernetes Version
// =============================================================================

/// Pinned Kubernetes engine versions a cluster may run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KubernetesVersion {
    /// Kubernetes 1.25
    V1_25,
    /// Kubernetes 1.28
    V1_28,
    /// Kubernetes 1.29
    V1_29,
    /// Kubernetes 1.30
    V1_30,
    /// Kubernetes 1.32
    V1_32,
}

impl KubernetesVersion {
    /// Version string as pinned in the cluster node
    pub fn as_str(&self) -> &'static str {
        match self {
            KubernetesVersion::V1_25 => "1.25",
            KubernetesVersion::V1_28 => "1.28",
            KubernetesVersion::V1_29 => "1.29",
            KubernetesVersion::V1_30 => "1.30",
            KubernetesVersion::V1_32 => "1.32",
        }
    }

    /// Whether clusters at this version need an explicit compatibility layer
    ///
    /// The deployment engine stops auto-discovering execution shims at 1.29.
    pub fn requires_compat_layer(&self) -> bool {
        *self >= KubernetesVersion::V1_29
    }
}

impl std::fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Compatibility Layer
// =============================================================================

/// Execution-shim layer referenced by clusters on newer versions
#[derive(Clone, Debug, PartialEq)]
pub struct CompatLayer {
    logical_id: String,
    version: KubernetesVersion,
}

impl CompatLayer {
    /// Create a layer for the given engine version
    pub fn new(logical_id: impl Into<String>, version: KubernetesVersion) -> Self {
        Self {
            logical_id: logical_id.into(),
            version,
        }
    }

    /// Logical id of the layer node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Compile the layer into its resource node
    pub fn node(&self) -> ResourceNode {
        ResourceNode::new(
            &self.logical_id,
            "AWS::Lambda::LayerVersion",
            json!({
                "Description": format!("kubectl compatibility layer for Kubernetes {}", self.version),
                "CompatibleRuntimes": ["provided.al2023"],
            }),
        )
    }
}

// =============================================================================
// Cluster
// =============================================================================

/// A managed container-orchestration endpoint
///
/// Created once per stack and immutable after construction; every other
/// construct references it by marker or attaches through its helpers.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    logical_id: String,
    name: String,
    version: KubernetesVersion,
    compat_layer: Option<CompatLayer>,
}

impl Cluster {
    /// Create a cluster pinned to the given version
    ///
    /// A compatibility layer is created automatically when the version
    /// requires one.
    pub fn new(
        logical_id: impl Into<String>,
        name: impl Into<String>,
        version: KubernetesVersion,
    ) -> Self {
        let logical_id = logical_id.into();
        let compat_layer = version
            .requires_compat_layer()
            .then(|| CompatLayer::new(format!("{logical_id}CompatLayer"), version));
        Self {
            logical_id,
            name: name.into(),
            version,
            compat_layer,
        }
    }

    /// Logical id of the cluster node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Physical cluster name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pinned engine version
    pub fn version(&self) -> KubernetesVersion {
        self.version
    }

    /// The compatibility layer, when the version requires one
    pub fn compat_layer(&self) -> Option<&CompatLayer> {
        self.compat_layer.as_ref()
    }

    /// Reference marker for the cluster's name
    pub fn name_reference(&self) -> Value {
        reference(&self.logical_id)
    }

    /// Reference marker for the cluster's generated identity issuer,
    /// used as the federated principal of identity roles
    pub fn identity_issuer(&self) -> Value {
        attribute(&self.logical_id, "OpenIdConnectIssuerUrl")
    }

    /// Start a manifest applying objects to this cluster
    pub fn manifest(&self, logical_id: impl Into<String>) -> KubernetesManifest {
        KubernetesManifest::new(logical_id, self)
    }

    /// Attach a federated service account to this cluster
    pub fn service_account(
        &self,
        logical_id: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> FederatedServiceAccount {
        FederatedServiceAccount::new(logical_id, self, name, namespace)
    }

    /// Compile the cluster (and its layer, if any) into resource nodes
    pub fn nodes(&self) -> Vec<ResourceNode> {
        let mut properties = json!({
            "Name": self.name,
            "Version": self.version.as_str(),
        });

        let mut nodes = Vec::new();
        if let Some(layer) = &self.compat_layer {
            properties["CompatLayer"] = reference(layer.logical_id());
            nodes.push(layer.node());
        }

        let mut cluster = ResourceNode::new(&self.logical_id, "AWS::EKS::Cluster", properties);
        if let Some(layer) = &self.compat_layer {
            cluster = cluster.with_dependency(layer.logical_id());
        }
        nodes.push(cluster);
        nodes
    }
}

// =============================================================================
// Add-on
// =============================================================================

/// A managed add-on installed on the cluster
#[derive(Clone, Debug, PartialEq)]
pub struct Addon {
    logical_id: String,
    addon_name: String,
    cluster_id: String,
}

impl Addon {
    /// Install a named add-on on the given cluster
    pub fn new(logical_id: impl Into<String>, addon_name: impl Into<String>, cluster: &Cluster) -> Self {
        Self {
            logical_id: logical_id.into(),
            addon_name: addon_name.into(),
            cluster_id: cluster.logical_id().to_string(),
        }
    }

    /// The add-on enabling pod-identity associations
    pub fn pod_identity_agent(logical_id: impl Into<String>, cluster: &Cluster) -> Self {
        Self::new(logical_id, POD_IDENTITY_ADDON, cluster)
    }

    /// Logical id of the add-on node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Compile the add-on into its resource node
    pub fn node(&self) -> ResourceNode {
        ResourceNode::new(
            &self.logical_id,
            "AWS::EKS::Addon",
            json!({
                "AddonName": self.addon_name,
                "ClusterName": reference(&self.cluster_id),
            }),
        )
    }
}

// =============================================================================
// Kubernetes Manifest
// =============================================================================

/// A declarative set of Kubernetes objects applied to a cluster
///
/// The manifest node is how workloads and in-cluster identity halves reach
/// the cluster: its property bag embeds the serialized objects, and its
/// explicit edges tell the engine what must exist before the objects are
/// applied.
#[derive(Clone, Debug, PartialEq)]
pub struct KubernetesManifest {
    logical_id: String,
    cluster_id: String,
    objects: Vec<Value>,
    depends_on: Vec<String>,
}

impl KubernetesManifest {
    /// Start an empty manifest against the given cluster
    pub fn new(logical_id: impl Into<String>, cluster: &Cluster) -> Self {
        Self {
            logical_id: logical_id.into(),
            cluster_id: cluster.logical_id().to_string(),
            objects: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// Add a serialized Kubernetes object
    pub fn with_object(mut self, object: Value) -> Self {
        self.objects.push(object);
        self
    }

    /// Declare an explicit ordering edge
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

    /// Logical id of the manifest node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Compile the manifest into its resource node
    pub fn node(&self) -> ResourceNode {
        ResourceNode::new(
            &self.logical_id,
            "Custom::KubernetesManifest",
            json!({
                "ClusterName": reference(&self.cluster_id),
                "Manifest": self.objects,
            }),
        )
        .with_dependencies(self.depends_on.clone())
    }
}
