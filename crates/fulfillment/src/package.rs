use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Entity, LineItemId, PackageId, ShipmentId};
use storefront_orders::{LineItem, ShippingType};

/// A line item as it appears inside a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLine {
    pub line_item_id: LineItemId,
    pub sku: String,
    pub title: String,
    pub quantity: u32,
}

impl From<&LineItem> for PackageLine {
    fn from(item: &LineItem) -> Self {
        Self {
            line_item_id: item.id,
            sku: item.sku.clone(),
            title: item.title.clone(),
            quantity: item.quantity,
        }
    }
}

/// Rendered as "2 x SKU-1", the way package contents are listed.
impl core::fmt::Display for PackageLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} x {}", self.quantity, self.sku)
    }
}

/// A physical grouping of line items. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    id: PackageId,
    shipping_type: ShippingType,
    /// Sorted by line item id.
    lines: Vec<PackageLine>,
}

impl Package {
    pub(crate) fn new(id: PackageId, shipping_type: ShippingType, mut lines: Vec<PackageLine>) -> Self {
        lines.sort_by_key(|l| l.line_item_id);
        Self {
            id,
            shipping_type,
            lines,
        }
    }

    pub fn package_id(&self) -> PackageId {
        self.id
    }

    pub fn shipping_type(&self) -> &ShippingType {
        &self.shipping_type
    }

    pub fn lines(&self) -> &[PackageLine] {
        &self.lines
    }

    pub fn item_ids(&self) -> BTreeSet<LineItemId> {
        self.lines.iter().map(|l| l.line_item_id).collect()
    }

    pub fn contains(&self, item: LineItemId) -> bool {
        self.lines.iter().any(|l| l.line_item_id == item)
    }

    /// Summary like "1 x SKU-1, 1 x SKU-2".
    pub fn contents_summary(&self) -> String {
        self.lines
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Entity for Package {
    type Id = PackageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A dispatch of one or more packages.
///
/// Holds a copy of each package as it was when the shipment was made, so later
/// repackaging does not rewrite shipping history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub packages: Vec<Package>,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    pub fn package_ids(&self) -> Vec<PackageId> {
        self.packages.iter().map(Package::package_id).collect()
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
