//! Service identity bindings
//!
//! A service identity binds a workload to cloud permissions. Two mechanisms
//! exist, and a workload manifest may only reference an identity whose
//! mechanism is fully wired:
//!
//! - [`FederatedServiceAccount`]: a role trusting the cluster's identity
//!   issuer plus an annotated ServiceAccount manifest, attached directly to
//!   the cluster;
//! - [`PodIdentityBinding`]: a plain ServiceAccount manifest, a role
//!   trusting the pod-identity service principal, and a cluster-level
//!   association resource linking role, cluster, namespace, and account
//!   name. The association requires the pod-identity add-on.
//!
//! Both implement [`ServiceIdentity`], which is what the stack definitions
//! and workload manifests program against.

use serde_json::json;

use crate::iam::Role;
use crate::manifest::ServiceAccount;
use crate::stack::{reference, ResourceNode};

use super::{Addon, Cluster, KubernetesManifest};

/// Service principal assumed by pod-identity roles
pub const POD_IDENTITY_PRINCIPAL: &str = "pods.eks.amazonaws.com";

/// Annotation binding a federated service account to its role
pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

/// A fully wired service identity a workload manifest may reference
///
/// The two binding variants differ in every resource they emit, but a
/// workload only needs three things from an identity: the account name to
/// run as, the role to grant capabilities to, and the logical ids its
/// manifest must declare ordering edges on.
pub trait ServiceIdentity {
    /// Service-account name workloads run as
    fn service_account_name(&self) -> &str;

    /// Role carrying the identity's cloud permissions
    fn role(&self) -> &Role;

    /// Mutable role access, used to attach capability grants
    fn role_mut(&mut self) -> &mut Role;

    /// Logical ids a dependent workload manifest must declare edges on
    ///
    /// Covers the identity's full chain: every resource that has to exist
    /// before a pod referencing the account name can start.
    fn dependency_ids(&self) -> Vec<String>;

    /// Compile the identity into its resource nodes
    fn nodes(&self) -> Vec<ResourceNode>;
}

// =============================================================================
// Federated Variant
// =============================================================================

/// A federated service account attached directly to the cluster
///
/// Emits two nodes: a role whose trust document names the cluster's
/// generated identity issuer, and a manifest applying the ServiceAccount
/// object annotated with the role's ARN. The manifest depends on the role.
#[derive(Clone, Debug)]
pub struct FederatedServiceAccount {
    logical_id: String,
    name: String,
    role: Role,
    account_manifest: KubernetesManifest,
}

impl FederatedServiceAccount {
    /// Attach a federated service account to the given cluster
    pub fn new(
        logical_id: impl Into<String>,
        cluster: &Cluster,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        let logical_id = logical_id.into();
        let name = name.into();
        let namespace = namespace.into();

        let role = Role::assumed_by_federated(
            format!("{logical_id}Role"),
            cluster.identity_issuer(),
            ["sts:AssumeRoleWithWebIdentity"],
        );

        let account = ServiceAccount::new(&name, &namespace)
            .with_annotation(ROLE_ARN_ANNOTATION, role.arn());
        let account_manifest = cluster
            .manifest(&logical_id)
            .with_object(json!(account))
            .with_dependency(role.logical_id());

        Self {
            logical_id,
            name,
            role,
            account_manifest,
        }
    }

    /// Logical id of the account manifest node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl ServiceIdentity for FederatedServiceAccount {
    fn service_account_name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> &Role {
        &self.role
    }

    fn role_mut(&mut self) -> &mut Role {
        &mut self.role
    }

    fn dependency_ids(&self) -> Vec<String> {
        vec![
            self.logical_id.clone(),
            self.role.logical_id().to_string(),
        ]
    }

    fn nodes(&self) -> Vec<ResourceNode> {
        vec![self.role.node(), self.account_manifest.node()]
    }
}

// =============================================================================
// Pod-Identity Variant
// =============================================================================

/// A namespace-scoped account bound to a role through an association
///
/// Emits three nodes: a plain ServiceAccount manifest, a role trusting the
/// pod-identity service principal, and the association resource linking
/// role, cluster, namespace, and account name. The association depends on
/// the pod-identity add-on when one is wired in.
#[derive(Clone, Debug)]
pub struct PodIdentityBinding {
    logical_id: String,
    name: String,
    namespace: String,
    cluster_id: String,
    role: Role,
    account_manifest: KubernetesManifest,
    addon_id: Option<String>,
}

impl PodIdentityBinding {
    /// Bind a namespace/account pair on the given cluster to a new role
    pub fn new(
        logical_id: impl Into<String>,
        cluster: &Cluster,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        let logical_id = logical_id.into();
        let name = name.into();
        let namespace = namespace.into();

        let role = Role::assumed_by_service(
            format!("{logical_id}Role"),
            POD_IDENTITY_PRINCIPAL,
            ["sts:AssumeRole", "sts:TagSession"],
        );

        let account_manifest = cluster
            .manifest(format!("{logical_id}Account"))
            .with_object(json!(ServiceAccount::new(&name, &namespace)));

        Self {
            logical_id,
            name,
            namespace,
            cluster_id: cluster.logical_id().to_string(),
            role,
            account_manifest,
            addon_id: None,
        }
    }

    /// Require the pod-identity add-on before the association completes
    pub fn requires_addon(mut self, addon: &Addon) -> Self {
        self.addon_id = Some(addon.logical_id().to_string());
        self
    }

    /// Logical id of the association node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }
}

impl ServiceIdentity for PodIdentityBinding {
    fn service_account_name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> &Role {
        &self.role
    }

    fn role_mut(&mut self) -> &mut Role {
        &mut self.role
    }

    fn dependency_ids(&self) -> Vec<String> {
        let mut ids = vec![
            self.logical_id.clone(),
            self.role.logical_id().to_string(),
            self.account_manifest.logical_id().to_string(),
        ];
        if let Some(addon_id) = &self.addon_id {
            ids.push(addon_id.clone());
        }
        ids
    }

    fn nodes(&self) -> Vec<ResourceNode> {
        let mut association = ResourceNode::new(
            &self.logical_id,
            "AWS::EKS::PodIdentityAssociation",
            json!({
                "ClusterName": reference(&self.cluster_id),
                "Namespace": self.namespace,
                "ServiceAccount": self.name,
                "RoleArn": self.role.arn(),
            }),
        );
        if let Some(addon_id) = &self.addon_id {
            association = association.with_dependency(addon_id);
        }

        vec![self.role.node(), self.account_manifest.node(), association]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::KubernetesVersion;
    use crate::stack::Stack;

    fn cluster() -> Cluster {
        Cluster::new("Cluster", "demo-cluster", KubernetesVersion::V1_32)
    }

    // =========================================================================
    // Story: Federated Binding
    // =========================================================================

    /// Story: The federated variant is a role plus an annotated account
    #[test]
    fn story_federated_emits_role_and_annotated_account() {
        let identity = cluster().service_account("ServiceIdentity", "workload-identity", "default");

        let nodes = identity.nodes();
        assert_eq!(nodes.len(), 2);

        let role = &nodes[0];
        assert_eq!(role.logical_id(), "ServiceIdentityRole");
        assert_eq!(
            role.properties()["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]
                ["Federated"],
            json!({ "Fn::GetAtt": ["Cluster", "OpenIdConnectIssuerUrl"] })
        );

        let manifest = &nodes[1];
        let account = &manifest.properties()["Manifest"][0];
        assert_eq!(account["kind"], json!("ServiceAccount"));
        assert_eq!(
            account["metadata"]["annotations"][ROLE_ARN_ANNOTATION],
            json!({ "Fn::GetAtt": ["ServiceIdentityRole", "Arn"] })
        );
    }

    /// Story: The account manifest waits for its role
    #[test]
    fn story_federated_account_depends_on_role() {
        let c = cluster();
        let identity = c.service_account("ServiceIdentity", "workload-identity", "default");

        let mut stack = Stack::new("Probe");
        stack.add_resources(c.nodes());
        stack.add_resources(identity.nodes());
        let template = stack.synth().unwrap();

        assert!(template.depends_on("ServiceIdentity", "ServiceIdentityRole"));
    }

    /// Story: Dependents must wait for the whole federated chain
    #[test]
    fn story_federated_dependency_ids_cover_chain() {
        let identity = cluster().service_account("ServiceIdentity", "workload-identity", "default");
        let mut ids = identity.dependency_ids();
        ids.sort();
        assert_eq!(ids, ["ServiceIdentity", "ServiceIdentityRole"]);
    }

    // =========================================================================
    // Story: Pod-Identity Binding
    // =========================================================================

    /// Story: The association links role, cluster, namespace, and account
    #[test]
    fn story_association_links_all_four_names() {
        let c = cluster();
        let binding = PodIdentityBinding::new("PodIdentity", &c, "workload-pod-identity", "default");

        let nodes = binding.nodes();
        assert_eq!(nodes.len(), 3);

        let association = &nodes[2];
        assert_eq!(association.type_(), "AWS::EKS::PodIdentityAssociation");
        let props = association.properties();
        assert_eq!(props["ClusterName"], json!({ "Ref": "Cluster" }));
        assert_eq!(props["Namespace"], json!("default"));
        assert_eq!(props["ServiceAccount"], json!("workload-pod-identity"));
        assert_eq!(
            props["RoleArn"],
            json!({ "Fn::GetAtt": ["PodIdentityRole", "Arn"] })
        );
    }

    /// Story: The role trusts only the pod-identity service principal
    #[test]
    fn story_pod_identity_role_trust() {
        let c = cluster();
        let binding = PodIdentityBinding::new("PodIdentity", &c, "workload-pod-identity", "default");

        let trust = json!(binding.role().trust());
        assert_eq!(
            trust["Statement"][0]["Principal"]["Service"],
            json!(POD_IDENTITY_PRINCIPAL)
        );
        assert_eq!(
            trust["Statement"][0]["Action"],
            json!(["sts:AssumeRole", "sts:TagSession"])
        );
    }

    /// Story: Wiring in the add-on orders the association after it
    #[test]
    fn story_association_waits_for_addon() {
        let c = cluster();
        let addon = Addon::pod_identity_agent("PodIdentityAgent", &c);
        let binding = PodIdentityBinding::new("PodIdentity", &c, "workload-pod-identity", "default")
            .requires_addon(&addon);

        let mut stack = Stack::new("Probe");
        stack.add_resources(c.nodes());
        stack.add_resource(addon.node());
        stack.add_resources(binding.nodes());
        let template = stack.synth().unwrap();

        assert!(template.depends_on("PodIdentity", "PodIdentityAgent"));

        let mut ids = binding.dependency_ids();
        ids.sort();
        assert_eq!(
            ids,
            [
                "PodIdentity",
                "PodIdentityAccount",
                "PodIdentityAgent",
                "PodIdentityRole"
            ]
        );
    }

    /// Story: Stack code treats both variants uniformly
    #[test]
    fn story_variants_share_the_identity_seam() {
        let c = cluster();
        let identities: Vec<Box<dyn ServiceIdentity>> = vec![
            Box::new(c.service_account("ServiceIdentity", "workload-identity", "default")),
            Box::new(PodIdentityBinding::new(
                "PodIdentity",
                &c,
                "workload-pod-identity",
                "default",
            )),
        ];

        for identity in &identities {
            assert!(!identity.service_account_name().is_empty());
            assert!(!identity.dependency_ids().is_empty());
            assert!(!identity.nodes().is_empty());
        }
    }
}
