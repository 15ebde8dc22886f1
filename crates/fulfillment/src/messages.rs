//! Texts shown to store administrators on the packaging screens.

use storefront_core::PackageId;

/// Validation message for an empty selection.
pub const EMPTY_PACKAGE: &str = "Packages must contain at least one product.";

/// Shown instead of the product table when every item is already packaged.
pub const NO_PRODUCTS_AVAILABLE: &str = "There are no products available for this type of package.";

/// Shown on the packages page before the first package exists.
pub const NOT_ORGANIZED: &str = "This order's products have not been organized into packages.";

/// Description shown under the delete confirmation question.
pub const DELETE_CONSEQUENCE: &str = "The products it contains will be available for repackaging.";

/// Notice after a confirmed delete.
pub fn package_deleted(id: PackageId) -> String {
    format!("Package {id} has been deleted.")
}

/// Title of the delete confirmation step.
pub fn delete_question(id: PackageId) -> String {
    format!("Are you sure you want to delete package {id}?")
}
