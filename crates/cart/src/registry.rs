//! Ordered dispatch to registered cart hooks.

use crate::cart::{AddToCartRequest, CartItem, ItemData};
use crate::hook::{CartHook, Refusal};

/// Hooks in registration order.
///
/// Validation stops at the first refusal. Decoration runs every hook and merges their
/// entries; when two hooks set the same key the earlier registration wins.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn CartHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn CartHook>) {
        tracing::debug!(hook_id = hook.id(), "cart hook registered");
        self.hooks.push(hook);
    }

    /// Builder-style `register`.
    pub fn with(mut self, hook: Box<dyn CartHook>) -> Self {
        self.register(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|h| h.id())
    }

    pub fn validate(&self, request: &AddToCartRequest) -> Result<(), Refusal> {
        for hook in &self.hooks {
            if let Err(refusal) = hook.validate(request) {
                tracing::debug!(
                    hook_id = hook.id(),
                    product_id = %request.product_id,
                    silent = refusal.silent,
                    "add to cart refused"
                );
                return Err(refusal);
            }
        }
        Ok(())
    }

    pub fn decorate(&self, request: &AddToCartRequest) -> ItemData {
        let mut merged = request.data.clone();
        for hook in &self.hooks {
            for (key, value) in hook.decorate(request) {
                merged.entry(key).or_insert(value);
            }
        }
        merged
    }

    pub fn notify_insert(&self, item: &CartItem) {
        self.hooks.iter().for_each(|h| h.on_insert(item));
    }

    pub fn notify_update(&self, item: &CartItem) {
        self.hooks.iter().for_each(|h| h.on_update(item));
    }

    pub fn notify_delete(&self, item: &CartItem) {
        self.hooks.iter().for_each(|h| h.on_delete(item));
    }
}

impl core::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}
