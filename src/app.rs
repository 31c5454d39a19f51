//! Disposable construction root
//!
//! An [`App`] is the scoped context a set of stacks is built inside: created
//! for one synthesis run (typically one test invocation or one CLI call) and
//! discarded afterwards. There is no process-wide state anywhere in the
//! crate; two apps never observe each other.

use std::collections::BTreeMap;

use tracing::debug;

use crate::stack::Stack;
use crate::template::Template;
use crate::{Error, Result};

/// A disposable root owning the stacks of one synthesis run
#[derive(Clone, Debug, Default)]
pub struct App {
    stacks: Vec<Stack>,
}

impl App {
    /// Create an empty app root
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack to the app
    ///
    /// Duplicate stack names are not rejected here; they surface when the
    /// app is synthesized.
    pub fn add_stack(&mut self, stack: Stack) {
        self.stacks.push(stack);
    }

    /// Number of stacks currently registered
    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    /// Synthesize every stack into an [`Assembly`]
    pub fn synth(&self) -> Result<Assembly> {
        debug!(stacks = self.stacks.len(), "synthesizing app");

        let mut templates = BTreeMap::new();
        for stack in &self.stacks {
            let template = stack.synth()?;
            if templates.insert(stack.name().to_string(), template).is_some() {
                return Err(Error::validation(format!(
                    "duplicate stack name '{}' in app",
                    stack.name()
                )));
            }
        }
        Ok(Assembly { templates })
    }
}

/// The synthesized output of one app: templates keyed by stack name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assembly {
    templates: BTreeMap<String, Template>,
}

impl Assembly {
    /// Look up a template by stack name
    pub fn template(&self, stack_name: &str) -> Option<&Template> {
        self.templates.get(stack_name)
    }

    /// Iterate over (stack name, template) pairs in name order
    pub fn templates(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.templates.iter().map(|(name, t)| (name.as_str(), t))
    }

    /// Number of templates in the assembly
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the assembly holds no templates
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ResourceNode;
    use serde_json::json;

    // =========================================================================
    // Story: Scoped Construction Context
    // =========================================================================

    /// Story: An app is created per run and synthesizes its stacks by name
    #[test]
    fn story_app_synthesizes_registered_stacks() {
        let mut app = App::new();

        let mut stack = Stack::new("First");
        stack.add_resource(ResourceNode::new("A", "Test::Resource", json!({})));
        app.add_stack(stack);
        app.add_stack(Stack::new("Second"));

        let assembly = app.synth().unwrap();
        assert_eq!(assembly.len(), 2);
        assert_eq!(assembly.template("First").unwrap().resource_count(), 1);
        assert!(assembly.template("Second").unwrap().resources.is_empty());
        assert!(assembly.template("Missing").is_none());
    }

    /// Story: Two apps share nothing
    ///
    /// The construction context is scoped, created and discarded per run;
    /// stacks registered on one app are invisible to another.
    #[test]
    fn story_apps_are_isolated() {
        let mut first = App::new();
        first.add_stack(Stack::new("Only"));

        let second = App::new();
        assert_eq!(first.stack_count(), 1);
        assert_eq!(second.stack_count(), 0);
        assert!(second.synth().unwrap().is_empty());
    }

    /// Story: A stack error aborts app synthesis
    #[test]
    fn story_stack_error_propagates() {
        let mut app = App::new();
        let mut broken = Stack::new("Broken");
        broken.add_resource(ResourceNode::new("A", "Test::Resource", json!({})));
        broken.add_resource(ResourceNode::new("A", "Test::Resource", json!({})));
        app.add_stack(broken);

        assert!(matches!(app.synth(), Err(Error::Validation(_))));
    }

    /// Story: Duplicate stack names are rejected at synthesis
    #[test]
    fn story_duplicate_stack_names_rejected() {
        let mut app = App::new();
        app.add_stack(Stack::new("Twin"));
        app.add_stack(Stack::new("Twin"));

        let err = app.synth().unwrap_err();
        assert!(err.to_string().contains("Twin"));
    }
}
