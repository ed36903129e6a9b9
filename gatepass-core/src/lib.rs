pub mod payment;
pub mod repository;
pub mod signing;

pub use payment::{
    GatewayCallback, GatewayConfig, PaymentError, PaymentGateway, PaymentRequest, VnpayGateway,
};
pub use repository::{RetryPolicy, StoreError, StoreResult};
pub use signing::QueryParams;
