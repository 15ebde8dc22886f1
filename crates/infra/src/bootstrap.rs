//! Process wiring: builds every service over one in-memory event store and bus.

use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use serde_json::Value as JsonValue;

use storefront_cart::{AddToCartOutcome, AddToCartRequest, Cart, CartError, CartHook, HookRegistry};
use storefront_core::{PackageId, PaymentId};
use storefront_events::{EventBus, EventEnvelope, InMemoryEventBus, ProjectionRunner, Subscription};
use storefront_orders::OrderId;
use storefront_payments::PaymentMethods;
use storefront_rules::{
    ExecutionContext, InMemoryBanIpManager, PluginRegistry, RulesError, Services, StaticCountryManager,
};

use crate::clock::{Clock, SystemClock};
use crate::command_dispatcher::CommandDispatcher;
use crate::config::StorefrontConfig;
use crate::confirmation::PendingConfirmations;
use crate::event_store::InMemoryEventStore;
use crate::projections::{OrderLog, OrderLogProjection};
use crate::read_model::InMemoryReadStore;
use crate::repository::{EventSourcedOrderRepository, OrderRepository};
use crate::services::{OrderPackagingService, PaymentService};
use crate::streams;

pub type Store = Arc<InMemoryEventStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

type OrderLogRunner = ProjectionRunner<OrderLogProjection<InMemoryReadStore<OrderId, OrderLog>>>;

/// Countries offered by the billing country condition out of the box.
const DEFAULT_COUNTRIES: [(&str, &str); 4] = [
    ("CA", "Canada"),
    ("DE", "Germany"),
    ("GB", "United Kingdom"),
    ("US", "United States"),
];

struct OrderLogFeed {
    subscription: Subscription<EventEnvelope<JsonValue>>,
    runner: OrderLogRunner,
}

pub struct Storefront {
    config: StorefrontConfig,
    store: Store,
    orders: Arc<dyn OrderRepository>,
    packaging: OrderPackagingService<Store, Bus>,
    payments: PaymentService<Store, Bus>,
    hooks: HookRegistry,
    plugins: PluginRegistry,
    rule_services: Services,
    order_log: Mutex<OrderLogFeed>,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("config", &self.config)
            .field("packaging", &self.packaging)
            .field("payments", &self.payments)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Read `STOREFRONT_*` variables, install logging and wire everything up.
    pub fn from_env() -> anyhow::Result<Self> {
        storefront_observability::init();
        let config = StorefrontConfig::from_env().context("loading storefront configuration")?;
        Self::from_config(config)
    }

    pub fn from_config(config: StorefrontConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StorefrontConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let store: Store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        // Subscribe before any command can publish.
        let subscription = bus.subscribe();

        let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus));
        let orders: Arc<dyn OrderRepository> = Arc::new(EventSourcedOrderRepository::new(dispatcher.clone()));
        let methods = PaymentMethods::with_defaults();

        let packaging = OrderPackagingService::new(
            dispatcher.clone(),
            orders.clone(),
            PendingConfirmations::<PackageId>::new(config.confirmation_ttl()),
            clock.clone(),
        );
        let payments = PaymentService::new(
            dispatcher,
            orders.clone(),
            methods.clone(),
            config.currency.clone(),
            PendingConfirmations::<PaymentId>::new(config.confirmation_ttl()),
            clock,
        );

        let plugins = PluginRegistry::with_defaults().context("registering rules plugins")?;
        let rule_services = Services::new(
            Arc::new(StaticCountryManager::new(DEFAULT_COUNTRIES)),
            Arc::new(InMemoryBanIpManager::new()),
        );

        let projection = OrderLogProjection::new(InMemoryReadStore::new(), config.currency.clone(), methods);

        tracing::info!(
            confirmation_ttl_secs = config.confirmation_ttl_secs,
            conditions = plugins.condition_ids().count(),
            actions = plugins.action_ids().count(),
            "storefront ready"
        );

        Ok(Self {
            config,
            store,
            orders,
            packaging,
            payments,
            hooks: HookRegistry::new(),
            plugins,
            rule_services,
            order_log: Mutex::new(OrderLogFeed {
                subscription,
                runner: ProjectionRunner::new(projection),
            }),
        })
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn orders(&self) -> &dyn OrderRepository {
        self.orders.as_ref()
    }

    pub fn packaging(&self) -> &OrderPackagingService<Store, Bus> {
        &self.packaging
    }

    pub fn payments(&self) -> &PaymentService<Store, Bus> {
        &self.payments
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn register_cart_hook(&mut self, hook: Box<dyn CartHook>) {
        tracing::debug!(hook = hook.id(), "cart hook registered");
        self.hooks.register(hook);
    }

    /// Add to `cart` under the registered hooks and the configured product settings.
    pub fn add_to_cart(&self, cart: &mut Cart, request: AddToCartRequest) -> Result<AddToCartOutcome, CartError> {
        cart.add_item(&self.hooks, &self.config.product, request)
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn rule_services(&self) -> &Services {
        &self.rule_services
    }

    pub fn evaluate_condition(&self, id: &str, ctx: &ExecutionContext) -> Result<bool, RulesError> {
        let condition = self.plugins.create_condition(id, &self.rule_services)?;
        ctx.check(&condition.definition().contexts)?;
        condition.evaluate(ctx)
    }

    pub fn execute_action(&self, id: &str, ctx: &ExecutionContext) -> Result<(), RulesError> {
        let action = self.plugins.create_action(id, &self.rule_services)?;
        ctx.check(&action.definition().contexts)?;
        tracing::info!(action = id, summary = %action.summary(), "executing rules action");
        action.execute(ctx)
    }

    /// The order's history, after catching up with everything published so far.
    pub fn order_log(&self, order_id: OrderId) -> anyhow::Result<OrderLog> {
        let mut feed = self
            .order_log
            .lock()
            .map_err(|_| anyhow!("order log projection lock poisoned"))?;
        let OrderLogFeed { subscription, runner } = &mut *feed;

        for envelope in subscription.drain() {
            let decoded = streams::decode(&envelope)
                .with_context(|| format!("decoding {} event", envelope.aggregate_type()))?;
            runner.apply(&decoded).context("applying event to order log")?;
        }
        Ok(runner.projection().get(order_id))
    }
}
