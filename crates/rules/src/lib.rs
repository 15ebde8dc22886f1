//! Rules plugins: conditions and actions looked up by id.
//!
//! Plugins are registered explicitly in a [`PluginRegistry`] at start-up. Each entry is
//! a factory that receives the [`Services`] the plugin depends on, so instances never
//! reach for global state.

pub mod context;
pub mod error;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod services;

pub use context::{ContextDefinition, ContextValue, ExecutionContext};
pub use error::RulesError;
pub use plugin::{Action, Condition, PluginDefinition};
pub use plugins::{BillingCountryCondition, UnbanIpAction};
pub use registry::{ActionFactory, ConditionFactory, PluginRegistry};
pub use services::{
    BanIpManager, CountryManager, InMemoryBanIpManager, Services, StaticCountryManager,
};
