//! Values handed to plugins at evaluation time.

use std::collections::BTreeMap;
use std::net::IpAddr;

use storefront_orders::Order;

use crate::error::RulesError;

/// Declared input of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDefinition {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    Order(Box<Order>),
    Text(String),
    List(Vec<String>),
}

/// Named context values plus facts about the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    values: BTreeMap<String, ContextValue>,
    client_ip: Option<IpAddr>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ContextValue) -> Self {
        self.set(name, value);
        self
    }

    /// Address of the client making the current request.
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: ContextValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.values.get(name)
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    pub fn order(&self, name: &str) -> Result<&Order, RulesError> {
        match self.require(name)? {
            ContextValue::Order(order) => Ok(order),
            _ => Err(invalid(name, "order")),
        }
    }

    /// A list context. A single text value counts as a one-element list.
    pub fn strings(&self, name: &str) -> Result<Vec<&str>, RulesError> {
        match self.require(name)? {
            ContextValue::List(items) => Ok(items.iter().map(String::as_str).collect()),
            ContextValue::Text(item) => Ok(vec![item.as_str()]),
            ContextValue::Order(_) => Err(invalid(name, "list")),
        }
    }

    /// An optional text context.
    pub fn text(&self, name: &str) -> Result<Option<&str>, RulesError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ContextValue::Text(value)) => Ok(Some(value.as_str())),
            Some(_) => Err(invalid(name, "text")),
        }
    }

    /// Fails on the first missing required context, in declaration order.
    pub fn check(&self, definitions: &[ContextDefinition]) -> Result<(), RulesError> {
        for def in definitions.iter().filter(|d| d.required) {
            let value = self.require(def.name)?;
            if !def.multiple && matches!(value, ContextValue::List(_)) {
                return Err(invalid(def.name, "single value"));
            }
        }
        Ok(())
    }

    fn require(&self, name: &str) -> Result<&ContextValue, RulesError> {
        self.values
            .get(name)
            .ok_or_else(|| RulesError::MissingContext(name.to_string()))
    }
}

fn invalid(name: &str, expected: &'static str) -> RulesError {
    RulesError::InvalidContext {
        name: name.to_string(),
        expected,
    }
}
