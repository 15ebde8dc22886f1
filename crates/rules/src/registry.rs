//! Plugin lookup by id.

use std::collections::BTreeMap;

use crate::error::RulesError;
use crate::plugin::{Action, Condition};
use crate::plugins::{BillingCountryCondition, UnbanIpAction};
use crate::services::Services;

pub type ConditionFactory = Box<dyn Fn(&Services) -> Box<dyn Condition> + Send + Sync>;
pub type ActionFactory = Box<dyn Fn(&Services) -> Box<dyn Action> + Send + Sync>;

/// Condition and action factories keyed by plugin id.
///
/// Populated once at start-up; lookups afterwards only read.
#[derive(Default)]
pub struct PluginRegistry {
    conditions: BTreeMap<String, ConditionFactory>,
    actions: BTreeMap<String, ActionFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in plugins.
    pub fn with_defaults() -> Result<Self, RulesError> {
        let mut registry = Self::new();
        registry.register_condition(BillingCountryCondition::ID, |services| {
            Box::new(BillingCountryCondition::new(services.countries.clone()))
        })?;
        registry.register_action(UnbanIpAction::ID, |services| {
            Box::new(UnbanIpAction::new(services.bans.clone()))
        })?;
        Ok(registry)
    }

    pub fn register_condition<F>(&mut self, id: &str, factory: F) -> Result<(), RulesError>
    where
        F: Fn(&Services) -> Box<dyn Condition> + Send + Sync + 'static,
    {
        if self.conditions.contains_key(id) {
            return Err(RulesError::DuplicatePlugin(id.to_string()));
        }
        self.conditions.insert(id.to_string(), Box::new(factory));
        tracing::debug!(plugin_id = id, "condition plugin registered");
        Ok(())
    }

    pub fn register_action<F>(&mut self, id: &str, factory: F) -> Result<(), RulesError>
    where
        F: Fn(&Services) -> Box<dyn Action> + Send + Sync + 'static,
    {
        if self.actions.contains_key(id) {
            return Err(RulesError::DuplicatePlugin(id.to_string()));
        }
        self.actions.insert(id.to_string(), Box::new(factory));
        tracing::debug!(plugin_id = id, "action plugin registered");
        Ok(())
    }

    pub fn create_condition(&self, id: &str, services: &Services) -> Result<Box<dyn Condition>, RulesError> {
        let factory = self
            .conditions
            .get(id)
            .ok_or_else(|| RulesError::UnknownPlugin(id.to_string()))?;
        Ok(factory(services))
    }

    pub fn create_action(&self, id: &str, services: &Services) -> Result<Box<dyn Action>, RulesError> {
        let factory = self
            .actions
            .get(id)
            .ok_or_else(|| RulesError::UnknownPlugin(id.to_string()))?;
        Ok(factory(services))
    }

    pub fn condition_ids(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    pub fn action_ids(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

impl core::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("conditions", &self.condition_ids().collect::<Vec<_>>())
            .field("actions", &self.action_ids().collect::<Vec<_>>())
            .finish()
    }
}
