use gatepass_catalog::{AvailabilityService, CatalogRepository, PricingPolicy};
use gatepass_core::{PaymentGateway, RetryPolicy};
use gatepass_order::{
    CheckInEngine, CheckoutService, OrderNotifier, OrderRepository, PaymentOrchestrator,
    RefundProcessor, SettlementHandler,
};
use gatepass_store::app_config::RateLimitConfig;
use gatepass_store::RedisClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentOrchestrator>,
    pub settlement: Arc<SettlementHandler>,
    pub checkin: Arc<CheckInEngine>,
    pub availability: Arc<AvailabilityService>,
    pub refunds: Arc<RefundProcessor>,
    pub retry: RetryPolicy,
    /// `None` disables rate limiting.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

impl AppState {
    /// Wires every service over the same repositories.
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn OrderNotifier>,
        pricing: PricingPolicy,
        retry: RetryPolicy,
        auth: AuthConfig,
    ) -> Self {
        let settlement = Arc::new(SettlementHandler::new(orders.clone(), notifier.clone(), retry));

        Self {
            checkout: Arc::new(CheckoutService::new(
                orders.clone(),
                catalog.clone(),
                pricing,
                retry,
            )),
            payments: Arc::new(PaymentOrchestrator::new(
                gateway,
                orders.clone(),
                settlement.clone(),
                retry,
            )),
            checkin: Arc::new(CheckInEngine::new(
                orders.clone(),
                catalog.clone(),
                notifier,
                retry,
            )),
            availability: Arc::new(AvailabilityService::new(catalog.clone(), retry)),
            refunds: Arc::new(RefundProcessor::new(orders.clone(), catalog, retry)),
            settlement,
            orders,
            retry,
            redis: None,
            rate_limit: RateLimitConfig::default(),
            auth,
        }
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, config: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = config;
        self
    }
}
