//! Fulfillment domain module (event-sourced).
//!
//! Splits an order's shippable line items into disjoint packages and groups packages
//! into shipments. One `OrderPackaging` stream exists per order.

pub mod error;
pub mod messages;
pub mod package;
pub mod packaging;

pub use error::PackagingError;
pub use package::{Package, PackageLine, Shipment};
pub use packaging::{
    CreatePackage, CreateSeparatePackages, CreateShipment, DeletePackage, EditPackage,
    OpenPackaging, OrderPackaging, PackageCreated, PackageDeleted, PackageEdited,
    PackagingCommand, PackagingEvent, PackagingOpened, ShipmentCreated,
};
