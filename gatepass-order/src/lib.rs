pub mod checkin;
pub mod checkout;
pub mod fulfillment;
pub mod manager;
pub mod models;
pub mod orchestrator;
pub mod refund;
pub mod repository;
pub mod settlement;

#[cfg(test)]
mod testing;

pub use checkin::{select_eligible_session, CheckInConfirmation, CheckInEngine, CheckInError};
pub use checkout::{CheckoutError, CheckoutReceipt, CheckoutRequest, CheckoutService, TicketLine};
pub use fulfillment::{LogNotifier, OrderNotifier, QrPayload};
pub use manager::InMemoryOrderStore;
pub use models::{
    Issuance, Order, OrderStatus, PaymentInfo, PaymentMethod, RefundStatus, TicketInstance,
    TicketStatus, TicketTransition,
};
pub use orchestrator::{CallbackError, PaymentOrchestrator};
pub use refund::{RefundError, RefundProcessor, RefundSummary};
pub use repository::OrderRepository;
pub use settlement::{SettlementError, SettlementHandler, SettlementOutcome};
