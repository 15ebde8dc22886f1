use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateRoot, LineItemId, PackageId, ShipmentId};
use storefront_events::Event;
use storefront_orders::{LineItem, OrderId, ShippingType};

use crate::error::PackagingError;
use crate::package::{Package, PackageLine, Shipment};

/// Aggregate root: the packaging state of one order.
///
/// Line items arrive once, with `OpenPackaging`, as a copy of the order's items (they
/// never change after the order is placed). From then on the aggregate tracks which
/// package, if any, each shippable item sits in.
///
/// Invariants:
/// - an item is in at most one package;
/// - a package is never empty;
/// - package ids grow monotonically and a deleted id is never handed out again;
/// - deleting a package releases all of its items in the same event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPackaging {
    order_id: OrderId,
    items: BTreeMap<LineItemId, LineItem>,
    packages: BTreeMap<PackageId, Package>,
    assignments: BTreeMap<LineItemId, PackageId>,
    last_package_id: Option<PackageId>,
    shipments: BTreeMap<ShipmentId, Shipment>,
    last_shipment_id: Option<ShipmentId>,
    version: u64,
    opened: bool,
}

impl OrderPackaging {
    /// Not-yet-opened instance, ready for rehydration.
    pub fn empty(order_id: OrderId) -> Self {
        Self {
            order_id,
            items: BTreeMap::new(),
            packages: BTreeMap::new(),
            assignments: BTreeMap::new(),
            last_package_id: None,
            shipments: BTreeMap::new(),
            last_shipment_id: None,
            version: 0,
            opened: false,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    /// Shippable items not in any package, in line item order.
    pub fn unpackaged_items(&self) -> Vec<&LineItem> {
        self.items
            .values()
            .filter(|item| item.shippable && !self.assignments.contains_key(&item.id))
            .collect()
    }

    /// Unpackaged items grouped by the package type they ship in.
    pub fn unpackaged_by_shipping_type(&self) -> BTreeMap<ShippingType, Vec<&LineItem>> {
        let mut groups: BTreeMap<ShippingType, Vec<&LineItem>> = BTreeMap::new();
        for item in self.unpackaged_items() {
            groups.entry(item.shipping_type.clone()).or_default().push(item);
        }
        groups
    }

    /// Existing packages by ascending id.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn package(&self, id: PackageId) -> Option<&Package> {
        self.packages.get(&id)
    }

    pub fn package_of(&self, item: LineItemId) -> Option<PackageId> {
        self.assignments.get(&item).copied()
    }

    /// Every existing package can be shipped; there is no separate "ready" state.
    pub fn available_for_shipment(&self) -> Vec<&Package> {
        self.packages.values().collect()
    }

    pub fn shipments(&self) -> impl Iterator<Item = &Shipment> {
        self.shipments.values()
    }

    /// Id the next created package will get.
    pub fn next_package_id(&self) -> Result<PackageId, PackagingError> {
        match self.last_package_id {
            Some(last) => Ok(last.next()?),
            None => Ok(PackageId::FIRST),
        }
    }

    fn next_shipment_id(&self) -> Result<ShipmentId, PackagingError> {
        match self.last_shipment_id {
            Some(last) => Ok(last.next()?),
            None => Ok(ShipmentId::FIRST),
        }
    }
}

impl AggregateRoot for OrderPackaging {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.order_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenPackaging. Carries the order's line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPackaging {
    pub order_id: OrderId,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CreatePackage ("Create one package").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePackage {
    pub order_id: OrderId,
    pub items: BTreeSet<LineItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CreateSeparatePackages ("Make packages", one package per item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSeparatePackages {
    pub order_id: OrderId,
    pub items: BTreeSet<LineItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditPackage (replace membership).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPackage {
    pub order_id: OrderId,
    pub package_id: PackageId,
    pub items: BTreeSet<LineItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeletePackage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePackage {
    pub order_id: OrderId,
    pub package_id: PackageId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CreateShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShipment {
    pub order_id: OrderId,
    pub packages: BTreeSet<PackageId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackagingCommand {
    OpenPackaging(OpenPackaging),
    CreatePackage(CreatePackage),
    CreateSeparatePackages(CreateSeparatePackages),
    EditPackage(EditPackage),
    DeletePackage(DeletePackage),
    CreateShipment(CreateShipment),
}

/// Event: PackagingOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingOpened {
    pub order_id: OrderId,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PackageCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCreated {
    pub order_id: OrderId,
    pub package_id: PackageId,
    pub shipping_type: ShippingType,
    pub items: BTreeSet<LineItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PackageEdited. `items` is the full new membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEdited {
    pub order_id: OrderId,
    pub package_id: PackageId,
    pub items: BTreeSet<LineItemId>,
    pub released: BTreeSet<LineItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PackageDeleted. `released` lists every former member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDeleted {
    pub order_id: OrderId,
    pub package_id: PackageId,
    pub released: BTreeSet<LineItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub order_id: OrderId,
    pub shipment_id: ShipmentId,
    pub packages: BTreeSet<PackageId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackagingEvent {
    PackagingOpened(PackagingOpened),
    PackageCreated(PackageCreated),
    PackageEdited(PackageEdited),
    PackageDeleted(PackageDeleted),
    ShipmentCreated(ShipmentCreated),
}

impl PackagingEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            PackagingEvent::PackagingOpened(e) => e.order_id,
            PackagingEvent::PackageCreated(e) => e.order_id,
            PackagingEvent::PackageEdited(e) => e.order_id,
            PackagingEvent::PackageDeleted(e) => e.order_id,
            PackagingEvent::ShipmentCreated(e) => e.order_id,
        }
    }
}

impl Event for PackagingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PackagingEvent::PackagingOpened(_) => "fulfillment.packaging.opened",
            PackagingEvent::PackageCreated(_) => "fulfillment.package.created",
            PackagingEvent::PackageEdited(_) => "fulfillment.package.edited",
            PackagingEvent::PackageDeleted(_) => "fulfillment.package.deleted",
            PackagingEvent::ShipmentCreated(_) => "fulfillment.shipment.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PackagingEvent::PackagingOpened(e) => e.occurred_at,
            PackagingEvent::PackageCreated(e) => e.occurred_at,
            PackagingEvent::PackageEdited(e) => e.occurred_at,
            PackagingEvent::PackageDeleted(e) => e.occurred_at,
            PackagingEvent::ShipmentCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for OrderPackaging {
    type Command = PackagingCommand;
    type Event = PackagingEvent;
    type Error = PackagingError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PackagingEvent::PackagingOpened(e) => {
                self.order_id = e.order_id;
                self.items = e.lines.iter().map(|l| (l.id, l.clone())).collect();
                self.opened = true;
            }
            PackagingEvent::PackageCreated(e) => {
                let package = self.build_package(e.package_id, e.shipping_type.clone(), &e.items);
                for item in &e.items {
                    self.assignments.insert(*item, e.package_id);
                }
                self.packages.insert(e.package_id, package);
                self.last_package_id = self.last_package_id.max(Some(e.package_id));
            }
            PackagingEvent::PackageEdited(e) => {
                for item in &e.released {
                    self.assignments.remove(item);
                }
                for item in &e.items {
                    self.assignments.insert(*item, e.package_id);
                }
                let shipping_type = self
                    .packages
                    .get(&e.package_id)
                    .map(|p| p.shipping_type().clone())
                    .unwrap_or_default();
                let package = self.build_package(e.package_id, shipping_type, &e.items);
                self.packages.insert(e.package_id, package);
            }
            PackagingEvent::PackageDeleted(e) => {
                self.packages.remove(&e.package_id);
                self.assignments.retain(|_, pkg| *pkg != e.package_id);
            }
            PackagingEvent::ShipmentCreated(e) => {
                let packages = e
                    .packages
                    .iter()
                    .filter_map(|id| self.packages.get(id).cloned())
                    .collect();
                self.shipments.insert(
                    e.shipment_id,
                    Shipment {
                        id: e.shipment_id,
                        packages,
                        created_at: e.occurred_at,
                    },
                );
                self.last_shipment_id = self.last_shipment_id.max(Some(e.shipment_id));
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PackagingCommand::OpenPackaging(cmd) => self.handle_open(cmd),
            PackagingCommand::CreatePackage(cmd) => self.handle_create(cmd),
            PackagingCommand::CreateSeparatePackages(cmd) => self.handle_create_separate(cmd),
            PackagingCommand::EditPackage(cmd) => self.handle_edit(cmd),
            PackagingCommand::DeletePackage(cmd) => self.handle_delete(cmd),
            PackagingCommand::CreateShipment(cmd) => self.handle_create_shipment(cmd),
        }
    }
}

impl OrderPackaging {
    fn build_package(
        &self,
        id: PackageId,
        shipping_type: ShippingType,
        items: &BTreeSet<LineItemId>,
    ) -> Package {
        let lines = items
            .iter()
            .filter_map(|item| self.items.get(item))
            .map(PackageLine::from)
            .collect();
        Package::new(id, shipping_type, lines)
    }

    fn ensure_opened(&self, order_id: OrderId) -> Result<(), PackagingError> {
        if !self.opened {
            return Err(PackagingError::NotOpened);
        }
        if self.order_id != order_id {
            return Err(PackagingError::Invariant("order_id mismatch".to_string()));
        }
        Ok(())
    }

    /// The item must be a shippable line of this order and must not sit in a package
    /// other than `allowed`.
    fn check_available(
        &self,
        item: LineItemId,
        allowed: Option<PackageId>,
    ) -> Result<&LineItem, PackagingError> {
        let line = self
            .items
            .get(&item)
            .filter(|l| l.shippable)
            .ok_or(PackagingError::InvalidItem(item))?;

        match self.assignments.get(&item) {
            Some(&package) if Some(package) != allowed => {
                Err(PackagingError::AlreadyPackaged { item, package })
            }
            _ => Ok(line),
        }
    }

    /// Validate a selection destined for a single package and return its shipping type.
    fn check_selection(
        &self,
        items: &BTreeSet<LineItemId>,
        allowed: Option<PackageId>,
        required_type: Option<&ShippingType>,
    ) -> Result<ShippingType, PackagingError> {
        if items.is_empty() {
            return Err(PackagingError::EmptySelection);
        }

        let mut shipping_type = required_type.cloned();
        for &item in items {
            let line = self.check_available(item, allowed)?;
            match &shipping_type {
                None => shipping_type = Some(line.shipping_type.clone()),
                Some(expected) if *expected != line.shipping_type => {
                    return Err(PackagingError::ShippingTypeMismatch {
                        item,
                        expected: expected.clone(),
                        found: line.shipping_type.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        shipping_type.ok_or(PackagingError::EmptySelection)
    }

    fn handle_open(&self, cmd: &OpenPackaging) -> Result<Vec<PackagingEvent>, PackagingError> {
        if self.opened {
            return Err(PackagingError::AlreadyOpened);
        }
        if self.order_id != cmd.order_id {
            return Err(PackagingError::Invariant("order_id mismatch".to_string()));
        }

        let mut seen = BTreeSet::new();
        for line in &cmd.lines {
            if !seen.insert(line.id) {
                return Err(PackagingError::Invariant(format!(
                    "duplicate line item {}",
                    line.id
                )));
            }
        }

        Ok(vec![PackagingEvent::PackagingOpened(PackagingOpened {
            order_id: cmd.order_id,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_create(&self, cmd: &CreatePackage) -> Result<Vec<PackagingEvent>, PackagingError> {
        self.ensure_opened(cmd.order_id)?;
        let shipping_type = self.check_selection(&cmd.items, None, None)?;

        Ok(vec![PackagingEvent::PackageCreated(PackageCreated {
            order_id: cmd.order_id,
            package_id: self.next_package_id()?,
            shipping_type,
            items: cmd.items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_create_separate(
        &self,
        cmd: &CreateSeparatePackages,
    ) -> Result<Vec<PackagingEvent>, PackagingError> {
        self.ensure_opened(cmd.order_id)?;
        if cmd.items.is_empty() {
            return Err(PackagingError::EmptySelection);
        }

        let mut events = Vec::with_capacity(cmd.items.len());
        let mut package_id = self.next_package_id()?;
        for (idx, &item) in cmd.items.iter().enumerate() {
            let line = self.check_available(item, None)?;
            if idx > 0 {
                package_id = package_id.next()?;
            }
            events.push(PackagingEvent::PackageCreated(PackageCreated {
                order_id: cmd.order_id,
                package_id,
                shipping_type: line.shipping_type.clone(),
                items: BTreeSet::from([item]),
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_edit(&self, cmd: &EditPackage) -> Result<Vec<PackagingEvent>, PackagingError> {
        self.ensure_opened(cmd.order_id)?;
        let package = self
            .packages
            .get(&cmd.package_id)
            .ok_or(PackagingError::PackageNotFound(cmd.package_id))?;

        self.check_selection(&cmd.items, Some(cmd.package_id), Some(package.shipping_type()))?;

        let current = package.item_ids();
        if current == cmd.items {
            return Ok(vec![]);
        }

        Ok(vec![PackagingEvent::PackageEdited(PackageEdited {
            order_id: cmd.order_id,
            package_id: cmd.package_id,
            items: cmd.items.clone(),
            released: current.difference(&cmd.items).copied().collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeletePackage) -> Result<Vec<PackagingEvent>, PackagingError> {
        self.ensure_opened(cmd.order_id)?;
        let package = self
            .packages
            .get(&cmd.package_id)
            .ok_or(PackagingError::PackageNotFound(cmd.package_id))?;

        Ok(vec![PackagingEvent::PackageDeleted(PackageDeleted {
            order_id: cmd.order_id,
            package_id: cmd.package_id,
            released: package.item_ids(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_create_shipment(
        &self,
        cmd: &CreateShipment,
    ) -> Result<Vec<PackagingEvent>, PackagingError> {
        self.ensure_opened(cmd.order_id)?;
        if cmd.packages.is_empty() {
            return Err(PackagingError::EmptyShipment);
        }
        if let Some(missing) = cmd.packages.iter().find(|id| !self.packages.contains_key(id)) {
            return Err(PackagingError::PackageNotFound(*missing));
        }

        Ok(vec![PackagingEvent::ShipmentCreated(ShipmentCreated {
            order_id: cmd.order_id,
            shipment_id: self.next_shipment_id()?,
            packages: cmd.packages.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
