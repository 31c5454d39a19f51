//! Key-value table construct and capability grants
//!
//! The [`Table`] is a persistent key-value store descriptor with a single
//! partition key. It carries no physical name: consumers embed the generated
//! name through [`Table::name_reference`]. Granting read/write capability
//! attaches the table's action set to a role's inline policy and records the
//! role in the table's granted-principal set, which the test suite uses to
//! check that every identity referenced by a manifest was actually granted.

use serde_json::{json, Value};

use crate::iam::{PolicyStatement, Role};
use crate::stack::{attribute, reference, ResourceNode};

/// Actions covered by a read/write grant
pub const READ_WRITE_ACTIONS: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:BatchWriteItem",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DeleteItem",
    "dynamodb:DescribeTable",
    "dynamodb:GetItem",
    "dynamodb:PutItem",
    "dynamodb:Query",
    "dynamodb:Scan",
    "dynamodb:UpdateItem",
];

/// Partition key attribute type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeType {
    /// String-typed attribute
    String,
    /// Number-typed attribute
    Number,
    /// Binary-typed attribute
    Binary,
}

impl AttributeType {
    /// Short type code used in the table schema
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }
}

/// A key-value table with a single partition key
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    logical_id: String,
    partition_key: String,
    partition_key_type: AttributeType,
    granted: Vec<String>,
}

impl Table {
    /// Create a table with a string-typed partition key
    pub fn new(logical_id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            partition_key: partition_key.into(),
            partition_key_type: AttributeType::String,
            granted: Vec::new(),
        }
    }

    /// Logical id of the table node
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Partition key attribute name
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Reference marker for the table's generated name
    pub fn name_reference(&self) -> Value {
        reference(&self.logical_id)
    }

    /// Reference marker for the table's generated ARN
    pub fn arn(&self) -> Value {
        attribute(&self.logical_id, "Arn")
    }

    /// Grant read/write capability to the given role
    ///
    /// Attaches the table's read/write action set to the role's inline
    /// policy and records the role as a granted principal.
    pub fn grant_read_write(&mut self, role: &mut Role) {
        role.attach_statement(
            "TableAccess",
            PolicyStatement::allow(READ_WRITE_ACTIONS.iter().copied(), self.arn()),
        );
        self.granted.push(role.logical_id().to_string());
    }

    /// Logical ids of every principal granted access to this table
    pub fn granted_principals(&self) -> &[String] {
        &self.granted
    }

    /// Compile the table into its resource node
    pub fn node(&self) -> ResourceNode {
        ResourceNode::new(
            &self.logical_id,
            "AWS::DynamoDB::Table",
            json!({
                "AttributeDefinitions": [{
                    "AttributeName": self.partition_key,
                    "AttributeType": self.partition_key_type.as_str(),
                }],
                "KeySchema": [{
                    "AttributeName": self.partition_key,
                    "KeyType": "HASH",
                }],
                "BillingMode": "PAY_PER_REQUEST",
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Story: Table Schema
    // =========================================================================

    /// Story: The table declares one string partition key and no name
    ///
    /// Leaving the physical name out lets the deployment engine generate
    /// one, which consumers pick up through the name reference marker.
    #[test]
    fn story_table_node_shape() {
        let table = Table::new("Table", "pk");
        let node = table.node();

        assert_eq!(node.type_(), "AWS::DynamoDB::Table");
        let props = node.properties();
        assert_eq!(props["KeySchema"][0]["AttributeName"], json!("pk"));
        assert_eq!(props["KeySchema"][0]["KeyType"], json!("HASH"));
        assert_eq!(props["AttributeDefinitions"][0]["AttributeType"], json!("S"));
        assert!(props.get("TableName").is_none());
    }

    #[test]
    fn test_attribute_type_codes() {
        assert_eq!(AttributeType::String.as_str(), "S");
        assert_eq!(AttributeType::Number.as_str(), "N");
        assert_eq!(AttributeType::Binary.as_str(), "B");
    }

    // =========================================================================
    // Story: Grants
    // =========================================================================

    /// Story: A read/write grant shows up in both the role and the table
    #[test]
    fn story_grant_wires_role_and_records_principal() {
        let mut table = Table::new("Table", "pk");
        let mut role =
            Role::assumed_by_service("WorkloadRole", "pods.eks.amazonaws.com", ["sts:AssumeRole"]);

        table.grant_read_write(&mut role);

        // The role gained the table's action set over the table's ARN
        let policies = role.policies();
        assert_eq!(policies.len(), 1);
        let statement = &policies[0].document.statement[0];
        assert_eq!(statement.resource, Some(table.arn()));
        for action in READ_WRITE_ACTIONS {
            assert!(statement.action.iter().any(|a| a == action));
        }

        // The table recorded the role as a granted principal
        assert_eq!(table.granted_principals(), ["WorkloadRole"]);
    }

    /// Story: Granting to several identities accumulates principals
    #[test]
    fn story_multiple_grants_accumulate() {
        let mut table = Table::new("Table", "pk");
        let mut first =
            Role::assumed_by_service("FirstRole", "pods.eks.amazonaws.com", ["sts:AssumeRole"]);
        let mut second =
            Role::assumed_by_service("SecondRole", "pods.eks.amazonaws.com", ["sts:AssumeRole"]);

        table.grant_read_write(&mut first);
        table.grant_read_write(&mut second);

        assert_eq!(table.granted_principals(), ["FirstRole", "SecondRole"]);
    }

    #[test]
    fn test_reference_markers() {
        let table = Table::new("Table", "pk");
        assert_eq!(table.name_reference(), json!({ "Ref": "Table" }));
        assert_eq!(table.arn(), json!({ "Fn::GetAtt": ["Table", "Arn"] }));
    }
}
