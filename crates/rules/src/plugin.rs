use crate::context::{ContextDefinition, ExecutionContext};
use crate::error::RulesError;

/// Static description of a plugin, shown in the rule editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub category: &'static str,
    pub contexts: Vec<ContextDefinition>,
}

pub trait Condition: Send + Sync {
    fn definition(&self) -> PluginDefinition;

    /// One-line human description.
    fn summary(&self) -> String;

    fn evaluate(&self, ctx: &ExecutionContext) -> Result<bool, RulesError>;
}

pub trait Action: Send + Sync {
    fn definition(&self) -> PluginDefinition;

    fn summary(&self) -> String;

    fn execute(&self, ctx: &ExecutionContext) -> Result<(), RulesError>;
}
