//! Error types for stack synthesis

use thiserror::Error;

/// Main error type for Gantry operations
///
/// Constructs never fail while a stack is being assembled; every problem a
/// stack can carry (duplicate ids, dangling references, cycles) is reported
/// here when the stack is synthesized.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Validation error for stack or resource structure
    #[error("validation error: {0}")]
    Validation(String),

    /// A reference or dependency edge targets a resource that does not exist
    #[error("dangling reference: '{from}' targets unknown resource '{to}'")]
    DanglingReference {
        /// Logical id of the resource holding the reference
        from: String,
        /// Logical id the reference points at
        to: String,
    },

    /// The dependency graph contains a cycle
    #[error("dependency cycle detected at resource '{0}'")]
    Cycle(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a dangling reference error for the given edge
    pub fn dangling(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::DanglingReference {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a cycle error anchored at the given resource
    pub fn cycle(logical_id: impl Into<String>) -> Self {
        Self::Cycle(logical_id.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story Tests: Error Reporting at Synthesis Time
    // ==========================================================================
    //
    // Construction is infallible; these tests demonstrate the categories a
    // synthesis run can surface and how callers tell them apart.

    /// Story: Duplicate logical ids surface as validation errors
    ///
    /// Two constructs registered under the same logical id would silently
    /// overwrite each other in the template, so synthesis refuses the stack.
    #[test]
    fn story_validation_reports_structural_problems() {
        let err = Error::validation("duplicate logical id 'Cluster'");
        assert!(err.to_string().contains("validation error"));
        assert!(err.to_string().contains("duplicate logical id"));

        match Error::validation("any message") {
            Error::Validation(msg) => assert_eq!(msg, "any message"),
            _ => panic!("Expected Validation variant"),
        }
    }

    /// Story: A manifest referencing a deleted identity is caught
    ///
    /// When a workload manifest declares a dependency on an identity that was
    /// never added to the stack, the deployment engine would fail mid-rollout.
    /// Synthesis reports the dangling edge up front with both endpoints.
    #[test]
    fn story_dangling_reference_names_both_endpoints() {
        let err = Error::dangling("Workload", "ServiceIdentity");
        assert!(err.to_string().contains("'Workload'"));
        assert!(err.to_string().contains("'ServiceIdentity'"));

        match err {
            Error::DanglingReference { from, to } => {
                assert_eq!(from, "Workload");
                assert_eq!(to, "ServiceIdentity");
            }
            _ => panic!("Expected DanglingReference variant"),
        }
    }

    /// Story: Cyclic ordering is rejected before the engine sees it
    ///
    /// A consuming engine schedules resources by topological order, which does
    /// not exist for a cyclic graph. The error names a resource on the cycle
    /// so the author knows where to start looking.
    #[test]
    fn story_cycle_names_a_resource_on_the_cycle() {
        let err = Error::cycle("Workload");
        assert!(err.to_string().contains("dependency cycle"));
        assert!(err.to_string().contains("'Workload'"));
    }

    /// Story: Error helper functions accept both String and &str
    ///
    /// For ergonomic API usage, error constructors accept anything that
    /// implements Into<String>.
    #[test]
    fn story_error_construction_ergonomics() {
        let dynamic_msg = format!("stack {} has no resources", "SmokeStack");
        let err = Error::validation(dynamic_msg);
        assert!(err.to_string().contains("SmokeStack"));

        let err = Error::serialization("static message");
        assert!(err.to_string().contains("static message"));
    }
}
