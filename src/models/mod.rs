pub mod actor;
pub mod catalog;
pub mod message;
pub mod offer;
pub mod order;
pub mod tracking;
pub mod wallet;

pub use actor::{Actor, Role};
pub use catalog::{AddOnService, Catalog, PaymentPlan, ServiceTypeCatalog};
pub use message::{Attachment, Message, MessageStatus, ModerationDecision};
pub use offer::{Offer, OfferDecision, OfferResponse, OfferStatus};
pub use order::{
    LineItem, Location, Order, OrderStatus, OrderView, Route, SelectedService, ServiceType,
};
pub use tracking::{OrderStatusStep, StepDetails, StepState, TimelineEntry, TrackingStatus};
pub use wallet::{
    BalanceDelta, LedgerMovement, LedgerPools, TransactionStatus, TransactionType,
    WalletSummary, WalletTransaction,
};
