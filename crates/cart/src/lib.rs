//! Shopping cart with pluggable hooks.
//!
//! Modules that want a say in what goes into a cart implement [`CartHook`] and are
//! registered once in a [`HookRegistry`]. The registry is passed to every cart
//! operation explicitly; there is no global hook table.

pub mod cart;
pub mod error;
pub mod hook;
pub mod registry;
pub mod settings;

pub use cart::{AddToCartOutcome, AddToCartRequest, Cart, CartId, CartItem, CartItemId, ItemData};
pub use error::CartError;
pub use hook::{CartHook, Refusal};
pub use registry::HookRegistry;
pub use settings::ProductSettings;
