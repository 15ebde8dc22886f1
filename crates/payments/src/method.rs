use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

/// A way of paying, identified by a stable machine name ("check") with a label for
/// people ("Check").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub label: String,
}

impl PaymentMethod {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Registered payment methods, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentMethods {
    methods: BTreeMap<String, PaymentMethod>,
}

impl PaymentMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// The manual methods a store has out of the box.
    pub fn with_defaults() -> Self {
        let mut methods = Self::new();
        methods.register(PaymentMethod::new("check", "Check"));
        methods.register(PaymentMethod::new("cod", "COD"));
        methods.register(PaymentMethod::new("other", "Other"));
        methods
    }

    /// Later registrations replace earlier ones with the same id.
    pub fn register(&mut self, method: PaymentMethod) {
        self.methods.insert(method.id.clone(), method);
    }

    pub fn get(&self, id: &str) -> Result<&PaymentMethod, PaymentError> {
        self.methods
            .get(id)
            .ok_or_else(|| PaymentError::UnknownMethod(id.to_string()))
    }

    /// Label for display; unknown ids (e.g. a method removed after payments were taken)
    /// show as their raw id.
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.methods.get(id).map(|m| m.label.as_str()).unwrap_or(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaymentMethod> {
        self.methods.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_labels() {
        let methods = PaymentMethods::with_defaults();
        assert_eq!(methods.label("check"), "Check");
        assert_eq!(methods.label("cod"), "COD");
        assert_eq!(methods.label("retired"), "retired");
        assert_eq!(methods.iter().count(), 3);
    }

    #[test]
    fn unknown_method_is_an_error() {
        let methods = PaymentMethods::with_defaults();
        assert_eq!(
            methods.get("bitcoin").unwrap_err(),
            PaymentError::UnknownMethod("bitcoin".to_string())
        );
    }
}
