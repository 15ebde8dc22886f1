use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use storefront_core::{Aggregate, LineItemId, PackageId};
use storefront_events::{EventBus, EventEnvelope};
use storefront_fulfillment::{
    CreatePackage, CreateSeparatePackages, CreateShipment, DeletePackage, EditPackage,
    OpenPackaging, OrderPackaging, Package, PackagingCommand, PackagingError, PackagingEvent,
    PackagingOpened, Shipment, messages,
};
use storefront_orders::{LineItem, OrderId, ShippingType};

use crate::clock::Clock;
use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::confirmation::PendingConfirmations;
use crate::event_store::EventStore;
use crate::repository::OrderRepository;
use crate::services::{DeleteConfirmation, ServiceError};
use crate::streams;

/// Result of a confirmed package delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedPackage {
    pub order_id: OrderId,
    pub package_id: PackageId,
    /// Items returned to the unpackaged pool.
    pub released: BTreeSet<LineItemId>,
    /// "Package N has been deleted."
    pub message: String,
}

/// Packaging and shipment operations on orders.
///
/// An order's packaging stream is opened on the first change with a copy of the
/// order's line items. Reads of a never-packaged order work from the order alone and
/// write nothing.
pub struct OrderPackagingService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    orders: Arc<dyn OrderRepository>,
    confirmations: PendingConfirmations<PackageId>,
    clock: Arc<dyn Clock>,
}

impl<S, B> std::fmt::Debug for OrderPackagingService<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPackagingService")
            .field("confirmations", &self.confirmations)
            .finish_non_exhaustive()
    }
}

impl<S, B> OrderPackagingService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        orders: Arc<dyn OrderRepository>,
        confirmations: PendingConfirmations<PackageId>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dispatcher,
            orders,
            confirmations,
            clock,
        }
    }

    /// Shippable items of the order that are not in any package, in line item order.
    pub fn list_unpackaged_shippable_items(&self, order_id: OrderId) -> Result<Vec<LineItem>, ServiceError> {
        let packaging = self.current(order_id)?;
        Ok(packaging.unpackaged_items().into_iter().cloned().collect())
    }

    /// Unpackaged items grouped by the package type they ship in.
    pub fn unpackaged_by_shipping_type(
        &self,
        order_id: OrderId,
    ) -> Result<BTreeMap<ShippingType, Vec<LineItem>>, ServiceError> {
        let packaging = self.current(order_id)?;
        Ok(packaging
            .unpackaged_by_shipping_type()
            .into_iter()
            .map(|(kind, items)| (kind, items.into_iter().cloned().collect()))
            .collect())
    }

    /// Notice replacing the product table once every shippable item is packaged.
    pub fn unpackaged_notice(&self, order_id: OrderId) -> Result<Option<&'static str>, ServiceError> {
        let packaging = self.current(order_id)?;
        Ok(packaging
            .unpackaged_items()
            .is_empty()
            .then_some(messages::NO_PRODUCTS_AVAILABLE))
    }

    pub fn create_package(&self, order_id: OrderId, items: BTreeSet<LineItemId>) -> Result<Package, ServiceError> {
        let dispatched = self.dispatch(
            order_id,
            PackagingCommand::CreatePackage(CreatePackage {
                order_id,
                items,
                occurred_at: self.clock.now(),
            }),
        )?;

        let package = created_packages(&dispatched)
            .into_iter()
            .next()
            .ok_or_else(|| PackagingError::Invariant("no package created".to_string()))?;
        tracing::info!(%order_id, package_id = %package.package_id(), "package created");
        Ok(package)
    }

    /// One package per selected item, all or nothing.
    pub fn create_separate_packages(
        &self,
        order_id: OrderId,
        items: BTreeSet<LineItemId>,
    ) -> Result<Vec<Package>, ServiceError> {
        let dispatched = self.dispatch(
            order_id,
            PackagingCommand::CreateSeparatePackages(CreateSeparatePackages {
                order_id,
                items,
                occurred_at: self.clock.now(),
            }),
        )?;

        let packages = created_packages(&dispatched);
        tracing::info!(%order_id, packages = packages.len(), "separate packages created");
        Ok(packages)
    }

    /// Replace the membership of a package. Items dropped from it become unpackaged.
    pub fn edit_package(
        &self,
        order_id: OrderId,
        package_id: PackageId,
        items: BTreeSet<LineItemId>,
    ) -> Result<Package, ServiceError> {
        let dispatched = self.dispatch(
            order_id,
            PackagingCommand::EditPackage(EditPackage {
                order_id,
                package_id,
                items,
                occurred_at: self.clock.now(),
            }),
        )?;

        if !dispatched.decided.is_empty() {
            tracing::info!(%order_id, %package_id, "package edited");
        }
        dispatched
            .aggregate
            .package(package_id)
            .cloned()
            .ok_or_else(|| PackagingError::PackageNotFound(package_id).into())
    }

    /// Delete a package right away, releasing its items. Interactive callers go
    /// through `request_delete` and `confirm_delete` instead.
    pub fn delete_package(&self, order_id: OrderId, package_id: PackageId) -> Result<DeletedPackage, ServiceError> {
        let dispatched = self.dispatch(
            order_id,
            PackagingCommand::DeletePackage(DeletePackage {
                order_id,
                package_id,
                occurred_at: self.clock.now(),
            }),
        )?;

        let released = dispatched
            .decided
            .iter()
            .find_map(|e| match e {
                PackagingEvent::PackageDeleted(e) if e.package_id == package_id => Some(e.released.clone()),
                _ => None,
            })
            .unwrap_or_default();
        tracing::info!(%order_id, %package_id, released = released.len(), "package deleted");

        Ok(DeletedPackage {
            order_id,
            package_id,
            released,
            message: messages::package_deleted(package_id),
        })
    }

    /// Existing packages, ascending by id.
    pub fn list_packages(&self, order_id: OrderId) -> Result<Vec<Package>, ServiceError> {
        let packaging = self.current(order_id)?;
        Ok(packaging.packages().cloned().collect())
    }

    /// Notice for the packages page while the order has no packages.
    pub fn packages_notice(&self, order_id: OrderId) -> Result<Option<&'static str>, ServiceError> {
        let packaging = self.current(order_id)?;
        Ok(packaging
            .packages()
            .next()
            .is_none()
            .then_some(messages::NOT_ORGANIZED))
    }

    pub fn available_for_shipment(&self, order_id: OrderId) -> Result<Vec<Package>, ServiceError> {
        let packaging = self.current(order_id)?;
        Ok(packaging.available_for_shipment().into_iter().cloned().collect())
    }

    pub fn create_shipment(&self, order_id: OrderId, packages: BTreeSet<PackageId>) -> Result<Shipment, ServiceError> {
        let dispatched = self.dispatch(
            order_id,
            PackagingCommand::CreateShipment(CreateShipment {
                order_id,
                packages,
                occurred_at: self.clock.now(),
            }),
        )?;

        let shipment_id = dispatched
            .decided
            .iter()
            .find_map(|e| match e {
                PackagingEvent::ShipmentCreated(e) => Some(e.shipment_id),
                _ => None,
            })
            .ok_or_else(|| PackagingError::Invariant("no shipment created".to_string()))?;
        let shipment = dispatched
            .aggregate
            .shipments()
            .find(|s| s.id == shipment_id)
            .cloned()
            .ok_or_else(|| PackagingError::Invariant(format!("shipment {shipment_id} missing")))?;

        tracing::info!(%order_id, %shipment_id, packages = shipment.packages.len(), "shipment created");
        Ok(shipment)
    }

    pub fn list_shipments(&self, order_id: OrderId) -> Result<Vec<Shipment>, ServiceError> {
        let packaging = self.current(order_id)?;
        Ok(packaging.shipments().cloned().collect())
    }

    /// Start a package delete. Nothing changes until the token is confirmed.
    pub fn request_delete(&self, order_id: OrderId, package_id: PackageId) -> Result<DeleteConfirmation, ServiceError> {
        let packaging = self.current(order_id)?;
        if packaging.package(package_id).is_none() {
            return Err(PackagingError::PackageNotFound(package_id).into());
        }

        let token = self.confirmations.issue(order_id, package_id, self.clock.now())?;
        tracing::debug!(%order_id, %package_id, token = %token.id, "package delete requested");
        Ok(DeleteConfirmation {
            token,
            question: messages::delete_question(package_id),
            description: Some(messages::DELETE_CONSEQUENCE.to_string()),
        })
    }

    pub fn confirm_delete(&self, token: Uuid) -> Result<DeletedPackage, ServiceError> {
        let (order_id, package_id) = self.confirmations.take(token, self.clock.now()).inspect_err(|e| {
            tracing::warn!(%token, error = %e, "package delete confirmation rejected");
        })?;
        self.delete_package(order_id, package_id)
    }

    pub fn cancel_delete(&self, token: Uuid) -> Result<(), ServiceError> {
        self.confirmations.cancel(token).inspect_err(|e| {
            tracing::warn!(%token, error = %e, "package delete cancellation rejected");
        })?;
        Ok(())
    }

    /// Packaging state for reads. A stream that was never opened is seeded in memory
    /// from the order.
    fn current(&self, order_id: OrderId) -> Result<OrderPackaging, ServiceError> {
        let mut packaging = self.load(order_id)?;
        if !packaging.is_opened() {
            let order = self.orders.load(order_id)?;
            packaging.apply(&PackagingEvent::PackagingOpened(PackagingOpened {
                order_id,
                lines: order.lines().to_vec(),
                occurred_at: self.clock.now(),
            }));
        }
        Ok(packaging)
    }

    fn load(&self, order_id: OrderId) -> Result<OrderPackaging, ServiceError> {
        Ok(self
            .dispatcher
            .load(order_id.0, streams::PACKAGING, |id| OrderPackaging::empty(OrderId::new(id)))?)
    }

    fn ensure_opened(&self, order_id: OrderId) -> Result<(), ServiceError> {
        if self.load(order_id)?.is_opened() {
            return Ok(());
        }

        let order = self.orders.load(order_id)?;
        let open = PackagingCommand::OpenPackaging(OpenPackaging {
            order_id,
            lines: order.lines().to_vec(),
            occurred_at: self.clock.now(),
        });
        match self.dispatch_raw(order_id, &open) {
            Ok(_) => {
                tracing::debug!(%order_id, "packaging opened");
                Ok(())
            }
            // Another writer opened it first.
            Err(DispatchError::Rejected(PackagingError::AlreadyOpened)) | Err(DispatchError::Concurrency(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn dispatch(
        &self,
        order_id: OrderId,
        command: PackagingCommand,
    ) -> Result<Dispatched<OrderPackaging>, ServiceError> {
        self.ensure_opened(order_id)?;
        Ok(self.dispatch_raw(order_id, &command)?)
    }

    fn dispatch_raw(
        &self,
        order_id: OrderId,
        command: &PackagingCommand,
    ) -> Result<Dispatched<OrderPackaging>, DispatchError<PackagingError>> {
        self.dispatcher
            .dispatch(order_id.0, streams::PACKAGING, command, |id| OrderPackaging::empty(OrderId::new(id)))
    }
}

fn created_packages(dispatched: &Dispatched<OrderPackaging>) -> Vec<Package> {
    dispatched
        .decided
        .iter()
        .filter_map(|e| match e {
            PackagingEvent::PackageCreated(e) => dispatched.aggregate.package(e.package_id).cloned(),
            _ => None,
        })
        .collect()
}
