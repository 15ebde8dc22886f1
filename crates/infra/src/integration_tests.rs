//! Integration tests for the full pipeline.
//!
//! Tests: Service → CommandDispatcher → EventStore → EventBus → OrderLogProjection
//!
//! Verifies:
//! - packaging operations keep every item in at most one package
//! - delete confirmations are single-use, expire, and change nothing until confirmed
//! - the order log reflects packaging and payment activity
//! - stale writers lose with a concurrency conflict

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::net::IpAddr;
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use storefront_cart::{AddToCartRequest, Cart, CartHook, CartId, Refusal};
    use storefront_core::{AggregateId, ExpectedVersion, LineItemId, Money, PackageId, UserId};
    use storefront_fulfillment::PackagingError;
    use storefront_orders::{Address, CreateOrder, NewLineItem, OrderId};
    use storefront_payments::PaymentError;
    use storefront_rules::{BillingCountryCondition, ContextValue, ExecutionContext, UnbanIpAction};

    use crate::bootstrap::Storefront;
    use crate::clock::ManualClock;
    use crate::config::StorefrontConfig;
    use crate::confirmation::ConfirmationError;
    use crate::event_store::{EventStore, EventStoreError, UncommittedEvent};
    use crate::services::ServiceError;
    use crate::streams;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (Storefront, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(test_time()));
        let storefront = Storefront::with_clock(StorefrontConfig::default(), clock.clone()).unwrap();
        (storefront, clock)
    }

    /// Order with four shippable items (ids 1 to 4) at $10.00 each.
    fn place_order(storefront: &Storefront) -> OrderId {
        let order_id = OrderId::new(AggregateId::new());
        let lines = (1..=4)
            .map(|n| NewLineItem::shippable(format!("SKU-{n}"), format!("Product {n}"), 1, Money::from_minor_units(1_000)))
            .collect();
        storefront
            .orders()
            .create(CreateOrder {
                order_id,
                primary_email: "customer@example.com".to_string(),
                billing_address: Some(Address::in_country("US").unwrap()),
                payment_method: Some("check".to_string()),
                lines,
                occurred_at: test_time(),
            })
            .unwrap();
        order_id
    }

    fn items(ids: &[u32]) -> BTreeSet<LineItemId> {
        ids.iter().map(|&id| LineItemId::new(id)).collect()
    }

    fn unpackaged_ids(storefront: &Storefront, order_id: OrderId) -> Vec<u32> {
        storefront
            .packaging()
            .list_unpackaged_shippable_items(order_id)
            .unwrap()
            .iter()
            .map(|item| item.id.get())
            .collect()
    }

    fn package_ids(storefront: &Storefront, order_id: OrderId) -> Vec<u32> {
        storefront
            .packaging()
            .list_packages(order_id)
            .unwrap()
            .iter()
            .map(|p| p.package_id().get())
            .collect()
    }

    #[test]
    fn one_package_for_everything_then_delete_releases_all_items() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        let package = storefront.packaging().create_package(order_id, items(&[1, 2, 3, 4])).unwrap();
        assert_eq!(package.package_id(), PackageId::new(1));
        assert_eq!(package.item_ids(), items(&[1, 2, 3, 4]));
        assert!(unpackaged_ids(&storefront, order_id).is_empty());

        let deleted = storefront.packaging().delete_package(order_id, PackageId::new(1)).unwrap();
        assert_eq!(deleted.released, items(&[1, 2, 3, 4]));
        assert_eq!(deleted.message, "Package 1 has been deleted.");
        assert_eq!(unpackaged_ids(&storefront, order_id), vec![1, 2, 3, 4]);
        assert!(package_ids(&storefront, order_id).is_empty());
    }

    #[test]
    fn notices_follow_packaging_progress() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);
        let packaging = storefront.packaging();

        assert_eq!(
            packaging.packages_notice(order_id).unwrap(),
            Some("This order's products have not been organized into packages.")
        );
        assert_eq!(packaging.unpackaged_notice(order_id).unwrap(), None);

        packaging.create_package(order_id, items(&[1, 2])).unwrap();
        assert_eq!(packaging.packages_notice(order_id).unwrap(), None);
        assert_eq!(packaging.unpackaged_notice(order_id).unwrap(), None);

        packaging.create_package(order_id, items(&[3, 4])).unwrap();
        assert_eq!(
            packaging.unpackaged_notice(order_id).unwrap(),
            Some("There are no products available for this type of package.")
        );
    }

    #[test]
    fn two_packages_are_listed_and_available_for_shipment() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        storefront.packaging().create_package(order_id, items(&[1, 2])).unwrap();
        storefront.packaging().create_package(order_id, items(&[3, 4])).unwrap();

        assert_eq!(package_ids(&storefront, order_id), vec![1, 2]);
        let available: Vec<u32> = storefront
            .packaging()
            .available_for_shipment(order_id)
            .unwrap()
            .iter()
            .map(|p| p.package_id().get())
            .collect();
        assert_eq!(available, vec![1, 2]);
    }

    #[test]
    fn editing_a_package_returns_dropped_items_to_the_pool() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        storefront.packaging().create_package(order_id, items(&[1, 2, 3, 4])).unwrap();
        let edited = storefront
            .packaging()
            .edit_package(order_id, PackageId::new(1), items(&[1, 2]))
            .unwrap();

        assert_eq!(edited.item_ids(), items(&[1, 2]));
        assert_eq!(unpackaged_ids(&storefront, order_id), vec![3, 4]);
    }

    #[test]
    fn empty_selection_is_rejected_without_changes() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        let err = storefront.packaging().create_package(order_id, BTreeSet::new()).unwrap_err();
        assert!(matches!(err, ServiceError::Packaging(PackagingError::EmptySelection)));
        assert_eq!(err.to_string(), "Packages must contain at least one product.");
        assert!(package_ids(&storefront, order_id).is_empty());
    }

    #[test]
    fn reads_of_an_unknown_order_report_not_found() {
        let (storefront, _) = setup();
        let order_id = OrderId::new(AggregateId::new());

        let err = storefront.packaging().list_packages(order_id).unwrap_err();
        assert!(matches!(err, ServiceError::OrderNotFound(id) if id == order_id));
        let err = storefront.packaging().create_package(order_id, items(&[1])).unwrap_err();
        assert!(matches!(err, ServiceError::OrderNotFound(_)));
    }

    #[test]
    fn reads_do_not_open_the_packaging_stream() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        assert_eq!(unpackaged_ids(&storefront, order_id), vec![1, 2, 3, 4]);
        let stream = storefront.store().load_stream(streams::PACKAGING, order_id.0).unwrap();
        assert!(stream.is_empty());
    }

    #[test]
    fn package_ids_are_not_reused_after_delete() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        storefront.packaging().create_package(order_id, items(&[1])).unwrap();
        storefront.packaging().delete_package(order_id, PackageId::new(1)).unwrap();
        let package = storefront.packaging().create_package(order_id, items(&[1])).unwrap();

        assert_eq!(package.package_id(), PackageId::new(2));
    }

    #[test]
    fn separate_packages_and_a_shipment() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        let packages = storefront
            .packaging()
            .create_separate_packages(order_id, items(&[2, 3]))
            .unwrap();
        let ids: Vec<u32> = packages.iter().map(|p| p.package_id().get()).collect();
        assert_eq!(ids, vec![1, 2]);

        let shipment = storefront
            .packaging()
            .create_shipment(order_id, [PackageId::new(1), PackageId::new(2)].into_iter().collect())
            .unwrap();
        assert_eq!(shipment.package_ids(), vec![PackageId::new(1), PackageId::new(2)]);
        assert_eq!(storefront.packaging().list_shipments(order_id).unwrap().len(), 1);
    }

    #[test]
    fn package_delete_needs_confirmation() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);
        storefront.packaging().create_package(order_id, items(&[1, 2])).unwrap();

        let request = storefront.packaging().request_delete(order_id, PackageId::new(1)).unwrap();
        assert_eq!(request.question, "Are you sure you want to delete package 1?");
        assert_eq!(
            request.description.as_deref(),
            Some("The products it contains will be available for repackaging.")
        );
        assert_eq!(package_ids(&storefront, order_id), vec![1]);

        let deleted = storefront.packaging().confirm_delete(request.token.id).unwrap();
        assert_eq!(deleted.package_id, PackageId::new(1));
        assert_eq!(unpackaged_ids(&storefront, order_id), vec![1, 2, 3, 4]);

        let err = storefront.packaging().confirm_delete(request.token.id).unwrap_err();
        assert!(matches!(err, ServiceError::Confirmation(ConfirmationError::UnknownConfirmation)));
    }

    #[test]
    fn cancelled_or_expired_package_delete_changes_nothing() {
        let (storefront, clock) = setup();
        let order_id = place_order(&storefront);
        storefront.packaging().create_package(order_id, items(&[1])).unwrap();

        let cancelled = storefront.packaging().request_delete(order_id, PackageId::new(1)).unwrap();
        storefront.packaging().cancel_delete(cancelled.token.id).unwrap();
        assert!(storefront.packaging().confirm_delete(cancelled.token.id).is_err());

        let expired = storefront.packaging().request_delete(order_id, PackageId::new(1)).unwrap();
        clock.advance(Duration::seconds(901));
        let err = storefront.packaging().confirm_delete(expired.token.id).unwrap_err();
        assert!(matches!(err, ServiceError::Confirmation(ConfirmationError::ConfirmationExpired(_))));

        assert_eq!(package_ids(&storefront, order_id), vec![1]);
    }

    #[test]
    fn requesting_delete_of_a_missing_package_fails_up_front() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        let err = storefront.packaging().request_delete(order_id, PackageId::new(7)).unwrap_err();
        assert!(matches!(err, ServiceError::Packaging(PackagingError::PackageNotFound(id)) if id == PackageId::new(7)));

        let err = storefront.packaging().cancel_delete(Uuid::now_v7()).unwrap_err();
        assert!(matches!(err, ServiceError::Confirmation(ConfirmationError::UnknownConfirmation)));
    }

    #[test]
    fn payments_adjust_the_balance_and_delete_with_confirmation() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);
        let clerk = UserId::new();

        assert_eq!(storefront.payments().balance(order_id).unwrap(), Money::from_minor_units(4_000));

        let payment = storefront
            .payments()
            .enter_payment(order_id, "check", Money::from_minor_units(1_500), Some("check #1001".to_string()), clerk)
            .unwrap();
        assert_eq!(storefront.payments().balance(order_id).unwrap(), Money::from_minor_units(2_500));
        assert_eq!(storefront.payments().list_payments(order_id).unwrap(), vec![payment.clone()]);

        let request = storefront.payments().request_delete(order_id, payment.id).unwrap();
        assert_eq!(request.question, "Are you sure you want to delete this payment?");
        let deleted = storefront.payments().confirm_delete(request.token.id).unwrap();
        assert_eq!(deleted.payment, payment);
        assert_eq!(deleted.message, "Payment deleted.");
        assert_eq!(storefront.payments().balance(order_id).unwrap(), Money::from_minor_units(4_000));
    }

    #[test]
    fn payments_reject_zero_amounts_and_unknown_methods() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);
        let clerk = UserId::new();

        let err = storefront
            .payments()
            .enter_payment(order_id, "check", Money::from_minor_units(0), None, clerk)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Payment(PaymentError::ZeroAmount)));

        let err = storefront
            .payments()
            .enter_payment(order_id, "barter", Money::from_minor_units(100), None, clerk)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Payment(PaymentError::UnknownMethod(_))));
        assert!(storefront.payments().list_payments(order_id).unwrap().is_empty());
    }

    #[test]
    fn order_log_follows_packaging_and_payments() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);

        storefront.packaging().create_package(order_id, items(&[1, 2])).unwrap();
        storefront.packaging().delete_package(order_id, PackageId::new(1)).unwrap();
        storefront
            .payments()
            .enter_payment(order_id, "check", Money::from_minor_units(1_500), None, UserId::new())
            .unwrap();

        let log = storefront.order_log(order_id).unwrap();
        assert_eq!(
            log.messages(),
            vec![
                "Order created.",
                "Package 1 created.",
                "Package 1 has been deleted.",
                "Check payment for $15.00 entered.",
            ]
        );
    }

    #[test]
    fn order_logs_are_kept_per_order() {
        let (storefront, _) = setup();
        let first = place_order(&storefront);
        let second = place_order(&storefront);

        storefront.packaging().create_package(first, items(&[1])).unwrap();

        assert_eq!(storefront.order_log(first).unwrap().entries.len(), 2);
        assert_eq!(storefront.order_log(second).unwrap().messages(), vec!["Order created."]);
    }

    #[test]
    fn stale_packaging_writer_loses_with_concurrency_error() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);
        storefront.packaging().create_package(order_id, items(&[1])).unwrap();

        let stale = UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id: order_id.0,
            aggregate_type: streams::PACKAGING.to_string(),
            event_type: "fulfillment.package.created".to_string(),
            event_version: 1,
            occurred_at: test_time(),
            payload: serde_json::json!({}),
        };
        let err = storefront
            .store()
            .append(vec![stale], ExpectedVersion::Exact(1))
            .unwrap_err();

        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(package_ids(&storefront, order_id), vec![1]);
    }

    #[test]
    fn items_in_another_package_cannot_be_taken() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);
        storefront.packaging().create_package(order_id, items(&[1, 2])).unwrap();
        storefront.packaging().create_package(order_id, items(&[3])).unwrap();

        let err = storefront
            .packaging()
            .edit_package(order_id, PackageId::new(2), items(&[2, 3]))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Packaging(PackagingError::AlreadyPackaged { package, .. }) if package == PackageId::new(1)
        ));

        let groups = storefront.packaging().unpackaged_by_shipping_type(order_id).unwrap();
        let remaining: Vec<u32> = groups.values().flatten().map(|item| item.id.get()).collect();
        assert_eq!(remaining, vec![4]);
    }

    struct OneAtATime;

    impl CartHook for OneAtATime {
        fn id(&self) -> &str {
            "one_at_a_time"
        }

        fn validate(&self, request: &AddToCartRequest) -> Result<(), Refusal> {
            if request.quantity > 1 {
                return Err(Refusal::with_message("Only one per customer."));
            }
            Ok(())
        }
    }

    #[test]
    fn cart_adds_go_through_registered_hooks() {
        let (mut storefront, _) = setup();
        storefront.register_cart_hook(Box::new(OneAtATime));
        let mut cart = Cart::new(CartId("cart-1".to_string()));
        let request = |quantity| AddToCartRequest {
            product_id: "SKU-1".to_string(),
            title: "Product 1".to_string(),
            quantity,
            unit_price: Money::from_minor_units(1_000),
            data: Default::default(),
        };

        let refused = storefront.add_to_cart(&mut cart, request(2)).unwrap();
        assert!(!refused.success);
        assert_eq!(refused.message.as_deref(), Some("Only one per customer."));
        assert!(cart.is_empty());

        let added = storefront.add_to_cart(&mut cart, request(1)).unwrap();
        assert!(added.success);
        assert_eq!(cart.total().unwrap(), Money::from_minor_units(1_000));
    }

    #[test]
    fn rules_run_against_orders_and_request_ip() {
        let (storefront, _) = setup();
        let order_id = place_order(&storefront);
        let order = storefront.orders().load(order_id).unwrap();

        let ctx = ExecutionContext::new()
            .with("order", ContextValue::Order(Box::new(order)))
            .with("countries", ContextValue::List(vec!["CA".to_string(), "US".to_string()]));
        assert!(storefront.evaluate_condition(BillingCountryCondition::ID, &ctx).unwrap());

        let ip: IpAddr = "192.0.2.10".parse().unwrap();
        storefront.rule_services().bans.ban_ip(ip).unwrap();
        let ctx = ExecutionContext::new().with_client_ip(ip);
        storefront.execute_action(UnbanIpAction::ID, &ctx).unwrap();
        assert!(!storefront.rule_services().bans.is_banned(ip).unwrap());
    }
}
