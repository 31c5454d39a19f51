//! Workload stack definitions
//!
//! This module is the deployable product of the crate: given an app root, a
//! stack name, and a set of properties, [`WorkloadStack`] wires the full
//! resource graph - cluster (plus compatibility layer when the pinned
//! version needs one), optional pod-identity add-on, one or two service
//! identity bindings, the table with its capability grants, and one workload
//! manifest per identity - with no missing dependency edges and no dangling
//! references.
//!
//! Construction follows a fixed declarative sequence:
//!
//! 1. Cluster with a pinned engine version.
//! 2. Pod-identity add-on, when the variant uses associations.
//! 3. Service identity bindings for the variant.
//! 4. Table, granted read/write to every identity that needs it.
//! 5. Association wiring (pod-identity role, grant, association node).
//! 6. Workload manifests, each declaring edges on its identity's full chain.
//!
//! Constructors are infallible; anything wrong with the graph surfaces when
//! the app is synthesized.

use serde_json::json;
use tracing::debug;

use crate::app::App;
use crate::cluster::{
    Addon, Cluster, KubernetesVersion, PodIdentityBinding, ServiceIdentity,
};
use crate::manifest::{Container, EnvVar, Pod};
use crate::stack::Stack;
use crate::table::Table;
use crate::{DEFAULT_NAMESPACE, DEFAULT_PARTITION_KEY, TABLE_NAME_ENV};

/// Image run by the workload pods
const WORKLOAD_IMAGE: &str = "nginx:stable";

/// Which identity binding mechanisms a workload stack wires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityVariant {
    /// Federated service account attached directly to the cluster
    Federated,
    /// Namespace-scoped account bound through a pod-identity association
    PodIdentity,
    /// Both mechanisms side by side, one workload manifest each
    Dual,
}

/// Stack-level properties for a workload stack
#[derive(Clone, Debug)]
pub struct WorkloadStackProps {
    /// Identity binding variant to wire
    pub variant: IdentityVariant,
    /// Pinned cluster version
    pub version: KubernetesVersion,
    /// Namespace for identities and workloads
    pub namespace: String,
}

impl WorkloadStackProps {
    /// The earliest variant: an old pinned version, federated binding only
    pub fn federated() -> Self {
        Self {
            variant: IdentityVariant::Federated,
            version: KubernetesVersion::V1_25,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// The association variant on the newest pinned version
    pub fn pod_identity() -> Self {
        Self {
            variant: IdentityVariant::PodIdentity,
            version: KubernetesVersion::V1_32,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Both binding mechanisms on the newest pinned version
    pub fn dual() -> Self {
        Self {
            variant: IdentityVariant::Dual,
            version: KubernetesVersion::V1_32,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// The workload stack definition
pub struct WorkloadStack;

impl WorkloadStack {
    /// Build the stack and register it on the given app root
    pub fn add_to(app: &mut App, name: &str, props: WorkloadStackProps) {
        app.add_stack(Self::build(name, &props));
    }

    /// Build the fully wired stack
    pub fn build(name: &str, props: &WorkloadStackProps) -> Stack {
        debug!(stack = name, variant = ?props.variant, version = %props.version, "building workload stack");

        let mut stack = Stack::new(name);

        // 1. Cluster; the compatibility layer rides along when the pinned
        //    version requires one.
        let cluster = Cluster::new(
            "Cluster",
            format!("{}-cluster", name.to_lowercase()),
            props.version,
        );
        stack.add_resources(cluster.nodes());

        // 2. The add-on must exist before any association using it completes.
        let addon = matches!(
            props.variant,
            IdentityVariant::PodIdentity | IdentityVariant::Dual
        )
        .then(|| {
            let addon = Addon::pod_identity_agent("PodIdentityAgent", &cluster);
            stack.add_resource(addon.node());
            addon
        });

        // 3. One or two identity bindings; each slot pairs an identity with
        //    the workload manifest that will reference it.
        let mut slots: Vec<(String, String, Box<dyn ServiceIdentity>)> = Vec::new();
        let dual = props.variant == IdentityVariant::Dual;
        if matches!(
            props.variant,
            IdentityVariant::Federated | IdentityVariant::Dual
        ) {
            let identity =
                cluster.service_account("ServiceIdentity", "workload-identity", &props.namespace);
            slots.push((
                if dual { "FederatedWorkload" } else { "Workload" }.to_string(),
                if dual { "workload-federated" } else { "workload" }.to_string(),
                Box::new(identity),
            ));
        }
        if matches!(
            props.variant,
            IdentityVariant::PodIdentity | IdentityVariant::Dual
        ) {
            let mut binding = PodIdentityBinding::new(
                "PodIdentity",
                &cluster,
                "workload-pod-identity",
                &props.namespace,
            );
            if let Some(addon) = &addon {
                binding = binding.requires_addon(addon);
            }
            slots.push((
                if dual { "PodIdentityWorkload" } else { "Workload" }.to_string(),
                if dual { "workload-pod-identity" } else { "workload" }.to_string(),
                Box::new(binding),
            ));
        }

        // 4./5. Table and grants; granting before the identity nodes are
        //       emitted so the policies land in the role nodes.
        let mut table = Table::new("Table", DEFAULT_PARTITION_KEY);
        for (_, _, identity) in slots.iter_mut() {
            table.grant_read_write(identity.role_mut());
        }
        stack.add_resource(table.node());
        for (_, _, identity) in &slots {
            stack.add_resources(identity.nodes());
        }

        // 6. One workload manifest per identity, applied only after the
        //    identity chain is fully resolved.
        for (workload_id, pod_name, identity) in &slots {
            let pod = Pod::new(pod_name, &props.namespace, identity.service_account_name())
                .with_container(
                    Container::new("app", WORKLOAD_IMAGE)
                        .with_env(EnvVar::new(TABLE_NAME_ENV, table.name_reference())),
                );
            let manifest = cluster
                .manifest(workload_id)
                .with_object(json!(pod))
                .with_dependencies(identity.dependency_ids());
            stack.add_resource(manifest.node());
        }

        stack
    }
}
