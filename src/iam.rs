//! Roles, policy documents, and principals
//!
//! This module defines the typed identity/policy resources stacks emit:
//! trust documents describing who may assume a role, inline policies
//! describing what the role may do, and the [`Role`] construct that compiles
//! both into a declarative `AWS::IAM::Role` node. Policy evaluation is
//! entirely external; these types only have to serialize to the shape the
//! policy engine expects.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::stack::{attribute, ResourceNode};

/// Policy document version understood by the policy engine
pub const POLICY_VERSION: &str = "2012-10-17";

// =============================================================================
// Policy Documents
// =============================================================================

/// Principal of a trust statement
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Principal {
    /// A cloud service principal, named by its service domain
    Service(String),
    /// A federated identity provider; the value is usually a reference
    /// marker to a cluster's generated identity issuer
    Federated(Value),
}

/// One statement in a policy document
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PolicyStatement {
    /// Statement effect; this crate only ever emits `Allow`
    #[serde(rename = "Effect")]
    pub effect: String,

    /// Who the statement applies to (trust statements only)
    #[serde(rename = "Principal", default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    /// Allowed actions
    #[serde(rename = "Action")]
    pub action: Vec<String>,

    /// Resource the actions apply to; may be a reference marker
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
}

impl PolicyStatement {
    /// An allow statement over the given actions and resource
    pub fn allow<I, S>(actions: I, resource: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: "Allow".to_string(),
            principal: None,
            action: actions.into_iter().map(Into::into).collect(),
            resource: Some(resource),
        }
    }

    /// A trust statement allowing the given principal to perform `actions`
    pub fn trust<I, S>(principal: Principal, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: "Allow".to_string(),
            principal: Some(principal),
            action: actions.into_iter().map(Into::into).collect(),
            resource: None,
        }
    }
}

/// A policy document: a version pin plus a list of statements
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PolicyDocument {
    /// Document version
    #[serde(rename = "Version")]
    pub version: String,

    /// Statements, evaluated by the external policy engine
    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    /// A document holding the given statements
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: statements,
        }
    }
}

/// An inline policy attached to a role
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InlinePolicy {
    /// Policy name, unique within the role
    #[serde(rename = "PolicyName")]
    pub name: String,

    /// The policy document
    #[serde(rename = "PolicyDocument")]
    pub document: PolicyDocument,
}

// =============================================================================
// Role
// =============================================================================

/// A role construct: a trust document plus inline policies, compiled to an
/// `AWS::IAM::Role` node
#[derive(Clone, Debug, PartialEq)]
pub struct Role {
    logical_id: String,
    trust: PolicyDocument,
    policies: Vec<InlinePolicy>,
}

impl Role {
    /// A role assumable only by the given service principal
    pub fn assumed_by_service<I, S>(logical_id: impl Into<String>, service: &str, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logical_id: logical_id.into(),
            trust: PolicyDocument::new(vec![PolicyStatement::trust(
                Principal::Service(service.to_string()),
                actions,
            )]),
            policies: Vec::new(),
        }
    }

    /// A role assumable through a federated identity provider
    pub fn assumed_by_federated<I, S>(logical_id: impl Into<String>, provider: Value, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logical_id: logical_id.into(),
            trust: PolicyDocument::new(vec![PolicyStatement::trust(
                Principal::Federated(provider),
                actions,
            )]),
            policies: Vec::new(),
        }
    }

    /// Logical id of the role node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Reference marker for the role's generated ARN
    pub fn arn(&self) -> Value {
        attribute(&self.logical_id, "Arn")
    }

    /// The role's trust document
    pub fn trust(&self) -> &PolicyDocument {
        &self.trust
    }

    /// Inline policies currently attached
    pub fn policies(&self) -> &[InlinePolicy] {
        &self.policies
    }

    /// Append a statement to the named inline policy, creating the policy
    /// if this is its first statement
    pub fn attach_statement(&mut self, policy_name: &str, statement: PolicyStatement) {
        if let Some(policy) = self.policies.iter_mut().find(|p| p.name == policy_name) {
            policy.document.statement.push(statement);
        } else {
            self.policies.push(InlinePolicy {
                name: policy_name.to_string(),
                document: PolicyDocument::new(vec![statement]),
            });
        }
    }

    /// Compile the role into its resource node
    pub fn node(&self) -> ResourceNode {
        let mut properties = json!({ "AssumeRolePolicyDocument": self.trust });
        if !self.policies.is_empty() {
            properties["Policies"] = json!(self.policies);
        }
        ResourceNode::new(&self.logical_id, "AWS::IAM::Role", properties)
    }
}
